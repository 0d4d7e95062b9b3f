use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Blob container errors.
///
/// `Corrupt`, `VersionMismatch` and `ChecksumMismatch` mean the blob is
/// structurally untrustworthy for this build; callers on boot paths are
/// expected to treat them as fatal (log and terminate) rather than continue
/// into the object-graph decoder with bytes it cannot safely interpret.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },

    #[error("corrupt snapshot blob: {0}")]
    Corrupt(&'static str),

    #[error("snapshot checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error(
        "version mismatch between binary and snapshot blob\n\
         #   binary version: {binary_version}\n\
         # snapshot version: {snapshot_version}\n\
         # the snapshot consists of {raw_size} bytes and contains {num_contexts} context(s)"
    )]
    VersionMismatch {
        binary_version: String,
        snapshot_version: String,
        raw_size: usize,
        num_contexts: u32,
    },

    #[error("lz4 decompression failed: {0}")]
    Lz4Decompress(#[from] lz4_flex::block::DecompressError),
}
