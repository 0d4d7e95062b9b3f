//! Self-contained snapshot blob container.
//!
//! A snapshot blob packages a pre-initialized heap image (one startup
//! segment, one read-only segment, and zero or more context segments) behind
//! a fixed little-endian header, so a process can rebuild complex in-memory
//! object graphs by bulk-copying bytes instead of re-running initialization.
//!
//! This crate owns the container only: layout, assembly, integrity
//! verification (checksum + version gate) and zero-copy extraction, plus the
//! orchestration flows tying those to consumers. The object-graph
//! decoder/encoder and the scripting engine are external collaborators
//! reached through [`ImageDecoder`], [`SnapshotCreator`] and [`RuntimeHost`].

mod blob;
mod checksum;
mod compress;
mod creator;
mod error;
mod format;
mod types;

pub use crate::blob::SnapshotBlob;
pub use crate::checksum::checksum;
pub use crate::compress::{compress_segment, maybe_decompress, Compression};
pub use crate::creator::{
    create_snapshot_blob, warm_up_snapshot_blob, RuntimeHost, SnapshotCreator,
};
pub use crate::error::{Result, SnapshotError};
pub use crate::format::{
    context_offset_field, startup_snapshot_offset, CHECKSUM_OFFSET, FIRST_CONTEXT_OFFSET_OFFSET,
    NUM_CONTEXTS_OFFSET, READ_ONLY_OFFSET_OFFSET, REHASHABILITY_OFFSET, VERSION_STRING_LENGTH,
    VERSION_STRING_OFFSET,
};
pub use crate::types::{
    version_string, FunctionCodeHandling, Reservation, SegmentData, SerializedImage,
    SnapshotOptions,
};

use std::time::Instant;

/// External object-graph decoder: turns decompressed segment bytes back into
/// live heap structures.
pub trait ImageDecoder {
    type Context;
    /// Embedder-supplied state threaded through context decoding.
    type EmbedderFields;

    /// Build the process-wide image from the startup and read-only segments.
    /// Failures are propagated to the caller, not interpreted here.
    fn init_image(&mut self, startup: &[u8], read_only: &[u8], can_rehash: bool) -> bool;

    /// Materialize one context from its segment bytes. `None` means the
    /// decoder rejected the data.
    fn decode_context(
        &mut self,
        data: &[u8],
        can_rehash: bool,
        embedder_fields: &mut Self::EmbedderFields,
    ) -> Option<Self::Context>;
}

/// Cold-boot the process-wide image from `blob`.
///
/// This path assumes trusted, version-matched input: a version mismatch or a
/// failed checksum means the blob cannot be interpreted by this build, and
/// both surface as errors the caller is expected to treat as fatal. The
/// decoder's own verdict is returned as a plain boolean.
pub fn initialize<D: ImageDecoder>(
    blob: &SnapshotBlob,
    decoder: &mut D,
    options: &SnapshotOptions,
) -> Result<bool> {
    let start = Instant::now();

    blob.check_version(&options.version)?;
    if !blob.verify_checksum(options)? {
        return Err(SnapshotError::ChecksumMismatch {
            stored: blob.stored_checksum()?,
            computed: blob.compute_checksum(),
        });
    }

    let can_rehash = blob.rehashability()?;
    let startup_data = blob.extract_startup_data()?;
    let read_only_data = blob.extract_read_only_data()?;
    let startup = maybe_decompress(startup_data, options.compression)?;
    let read_only = maybe_decompress(read_only_data, options.compression)?;

    let success = decoder.init_image(&startup, &read_only, can_rehash);
    if options.profile {
        tracing::info!(
            bytes = startup_data.len(),
            elapsed = ?start.elapsed(),
            "deserialized instance image"
        );
    }
    Ok(success)
}

/// Materialize context `index` from `blob`.
///
/// An absent blob or a decoder rejection is `Ok(None)`, never fatal on its
/// own; only a structurally untrustworthy blob (bad offsets, bad index, bad
/// rehashability field) is an error. May be called many times against the
/// same blob, concurrently.
pub fn new_context_from_snapshot<D: ImageDecoder>(
    blob: Option<&SnapshotBlob>,
    index: u32,
    decoder: &mut D,
    embedder_fields: &mut D::EmbedderFields,
    options: &SnapshotOptions,
) -> Result<Option<D::Context>> {
    let Some(blob) = blob else {
        return Ok(None);
    };
    let start = Instant::now();

    let can_rehash = blob.rehashability()?;
    let context_data = blob.extract_context_data(index)?;
    let bytes = maybe_decompress(context_data, options.compression)?;

    let result = decoder.decode_context(&bytes, can_rehash, embedder_fields);
    if options.profile {
        tracing::info!(
            index,
            bytes = context_data.len(),
            elapsed = ?start.elapsed(),
            "deserialized context"
        );
    }
    Ok(result)
}

/// Whether a context snapshot exists at `index`. `false` when no blob is
/// attached or the index is out of range; never fatal, safe to call
/// speculatively.
pub fn has_context_snapshot(blob: Option<&SnapshotBlob>, index: u32) -> bool {
    blob.is_some_and(|blob| blob.has_context_snapshot(index))
}
