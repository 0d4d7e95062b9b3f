//! Snapshot blob layout:
//!
//! ```text
//! [0]   number of contexts N (u32)
//! [4]   rehashability (u32, 0 or 1)
//! [8]   checksum (u32)
//! [12]  version string (64 bytes, null padded)
//! [76]  offset to read-only segment (u32)
//! [80]  offset to context 0 (u32)
//! ...   offset to context N - 1 (u32)
//! ...   startup segment data (pointer-size aligned)
//! ...   read-only segment data
//! ...   context segment data, in index order
//! ```
//!
//! All integers are little-endian. The last context's segment extends exactly
//! to the end of the blob, so no total-length field is stored.
//!
//! Everything here is pure offset arithmetic. Inputs are trusted sizes
//! computed by the assembler, or header values the extractor bounds-checks
//! before passing in.

pub const NUM_CONTEXTS_OFFSET: usize = 0;
pub const REHASHABILITY_OFFSET: usize = NUM_CONTEXTS_OFFSET + 4;
pub const CHECKSUM_OFFSET: usize = REHASHABILITY_OFFSET + 4;
pub const VERSION_STRING_OFFSET: usize = CHECKSUM_OFFSET + 4;
pub const VERSION_STRING_LENGTH: usize = 64;
pub const READ_ONLY_OFFSET_OFFSET: usize = VERSION_STRING_OFFSET + VERSION_STRING_LENGTH;
pub const FIRST_CONTEXT_OFFSET_OFFSET: usize = READ_ONLY_OFFSET_OFFSET + 4;

const POINTER_ALIGNMENT: u64 = core::mem::size_of::<usize>() as u64;

/// Byte offset of the header field holding context `index`'s segment offset.
pub fn context_offset_field(index: u32) -> usize {
    FIRST_CONTEXT_OFFSET_OFFSET + index as usize * 4
}

/// Length of the header including the context offset array, before padding.
///
/// Computed in `u64` so an adversarial context count read from a corrupt
/// header cannot overflow on 32-bit targets.
pub fn header_len(num_contexts: u32) -> u64 {
    FIRST_CONTEXT_OFFSET_OFFSET as u64 + u64::from(num_contexts) * 4
}

/// First byte of the startup segment: the end of the header padded up to
/// pointer alignment. The padding bytes are zeroed by the assembler and never
/// read back.
pub fn startup_snapshot_offset(num_contexts: u32) -> u64 {
    pointer_size_align(header_len(num_contexts))
}

fn pointer_size_align(value: u64) -> u64 {
    (value + POINTER_ALIGNMENT - 1) & !(POINTER_ALIGNMENT - 1)
}

/// The region the checksum protects: everything from the version string field
/// to the end of the blob. The three leading u32 fields (context count,
/// rehashability, the checksum itself) are excluded so the checksum is not
/// self-referential, but the version string and all segment data are covered.
pub fn checksummed_region(blob: &[u8]) -> &[u8] {
    &blob[VERSION_STRING_OFFSET..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_field_offsets() {
        assert_eq!(NUM_CONTEXTS_OFFSET, 0);
        assert_eq!(REHASHABILITY_OFFSET, 4);
        assert_eq!(CHECKSUM_OFFSET, 8);
        assert_eq!(VERSION_STRING_OFFSET, 12);
        assert_eq!(READ_ONLY_OFFSET_OFFSET, 76);
        assert_eq!(FIRST_CONTEXT_OFFSET_OFFSET, 80);
    }

    #[test]
    fn context_offset_fields_are_contiguous() {
        assert_eq!(context_offset_field(0), FIRST_CONTEXT_OFFSET_OFFSET);
        assert_eq!(context_offset_field(1), FIRST_CONTEXT_OFFSET_OFFSET + 4);
        assert_eq!(context_offset_field(7), FIRST_CONTEXT_OFFSET_OFFSET + 28);
    }

    #[test]
    fn startup_offset_is_pointer_aligned() {
        for num_contexts in 0..16 {
            let offset = startup_snapshot_offset(num_contexts);
            let raw = header_len(num_contexts);
            assert_eq!(offset % POINTER_ALIGNMENT, 0);
            assert!(offset >= raw);
            assert!(offset - raw < POINTER_ALIGNMENT);
        }
    }

    #[test]
    fn checksummed_region_skips_leading_fields() {
        let blob: Vec<u8> = (0..100u8).collect();
        let region = checksummed_region(&blob);
        assert_eq!(region.len(), blob.len() - VERSION_STRING_OFFSET);
        assert_eq!(region[0], VERSION_STRING_OFFSET as u8);
    }
}
