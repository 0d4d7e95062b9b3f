use crate::compress::Compression;

/// One pre-allocation the external object-graph decoder will make while
/// materializing a segment. Opaque to the container apart from summing sizes
/// for profiling output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub chunk_size: u32,
}

/// Encoder output for one segment: payload bytes plus out-of-band reservation
/// metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentData {
    pub bytes: Vec<u8>,
    pub reservations: Vec<Reservation>,
}

impl SegmentData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            reservations: Vec::new(),
        }
    }

    pub fn with_reservations(bytes: Vec<u8>, reservations: Vec<Reservation>) -> Self {
        Self {
            bytes,
            reservations,
        }
    }

    pub(crate) fn reserved_bytes(&self) -> u64 {
        self.reservations
            .iter()
            .map(|r| u64::from(r.chunk_size))
            .sum()
    }
}

/// Everything the external encoder produces for one runtime instance: the
/// instance-wide startup segment, the shared read-only segment, and the
/// serialized contexts in index order.
#[derive(Debug, Clone, Default)]
pub struct SerializedImage {
    pub startup: SegmentData,
    pub read_only: SegmentData,
    pub contexts: Vec<SegmentData>,
    pub can_be_rehashed: bool,
}

/// Whether compiled-code artifacts survive serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCodeHandling {
    Clear,
    Keep,
}

/// Per-call configuration for assembly and extraction.
#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub compression: Compression,
    /// Emit segment sizes, reservation chunk counts and elapsed times as
    /// `tracing` events. Observational only; never affects produced bytes.
    pub profile: bool,
    /// Version string stamped into (and expected from) blobs. Defaults to the
    /// running build's version.
    pub version: String,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Lz4,
            profile: false,
            version: version_string(),
        }
    }
}

/// The running build's version string.
///
/// A blob stamped with a different string encodes object layouts this build's
/// decoder cannot safely interpret, so loading it is refused outright.
pub fn version_string() -> String {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_owned()
}
