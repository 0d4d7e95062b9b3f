use std::time::Instant;

use crate::checksum::checksum;
use crate::compress;
use crate::error::{Result, SnapshotError};
use crate::format;
use crate::types::{SegmentData, SnapshotOptions};

/// One assembled snapshot blob: an owned, contiguous buffer holding the
/// header, the startup segment, the read-only segment and zero or more
/// context segments.
///
/// Immutable after construction, so independent context materializations may
/// read it concurrently. Extraction hands out zero-copy views; nothing here
/// ever mutates the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBlob {
    data: Vec<u8>,
}

impl SnapshotBlob {
    /// Wrap raw bytes, e.g. a blob linked into the binary or read from disk.
    ///
    /// Only the fixed-header-presence check happens here; every later field
    /// read is bounds-checked against the actual length, so a corrupt blob
    /// surfaces as [`SnapshotError::Corrupt`] at extraction, never as an
    /// out-of-range read.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.len() < format::FIRST_CONTEXT_OFFSET_OFFSET {
            return Err(SnapshotError::Corrupt("blob shorter than fixed header"));
        }
        Ok(Self { data })
    }

    /// Assemble segments into one blob.
    ///
    /// Each segment group is compressed independently per
    /// `options.compression`, the header is filled in, and the checksum over
    /// the finished buffer is the last header write so that every other
    /// field, the version string included, is protected by it.
    pub fn create(
        startup: &SegmentData,
        read_only: &SegmentData,
        contexts: &[SegmentData],
        can_be_rehashed: bool,
        options: &SnapshotOptions,
    ) -> Result<SnapshotBlob> {
        let num_contexts: u32 = contexts
            .len()
            .try_into()
            .map_err(|_| SnapshotError::Corrupt("too many contexts"))?;

        let startup_compressed = compress::compress_segment(startup, options.compression);
        let read_only_compressed = compress::compress_segment(read_only, options.compression);
        let contexts_compressed: Vec<SegmentData> = contexts
            .iter()
            .map(|context| compress::compress_segment(context, options.compression))
            .collect();

        let startup_offset = format::startup_snapshot_offset(num_contexts);
        let mut total_length = startup_offset;
        for bytes in [&startup_compressed.bytes, &read_only_compressed.bytes]
            .into_iter()
            .chain(contexts_compressed.iter().map(|c| &c.bytes))
        {
            total_length = total_length
                .checked_add(bytes.len() as u64)
                .ok_or(SnapshotError::Corrupt("blob length overflow"))?;
        }
        if u32::try_from(total_length).is_err() {
            return Err(SnapshotError::Corrupt("snapshot blob exceeds u32 range"));
        }
        let total_length = total_length as usize;
        let startup_offset = startup_offset as usize;

        if options.profile {
            profile_reservations(startup, read_only, contexts);
        }

        let mut data = Vec::new();
        data.try_reserve_exact(total_length)
            .map_err(|_| SnapshotError::OutOfMemory { len: total_length })?;
        // Zeroed up front: the alignment padding before the startup segment is
        // never explicitly written and must not leak uninitialized memory.
        data.resize(total_length, 0);

        set_header_value(&mut data, format::NUM_CONTEXTS_OFFSET, num_contexts);
        set_header_value(
            &mut data,
            format::REHASHABILITY_OFFSET,
            u32::from(can_be_rehashed),
        );
        write_version_field(&mut data, &options.version)?;

        let mut payload_offset = startup_offset;
        payload_offset = write_segment(&mut data, payload_offset, &startup_compressed.bytes);
        if options.profile {
            tracing::info!(
                bytes = startup_compressed.bytes.len(),
                chunks = startup.reservations.len(),
                "snapshot blob startup segment"
            );
        }

        set_header_value(
            &mut data,
            format::READ_ONLY_OFFSET_OFFSET,
            payload_offset as u32,
        );
        payload_offset = write_segment(&mut data, payload_offset, &read_only_compressed.bytes);
        if options.profile {
            tracing::info!(
                bytes = read_only_compressed.bytes.len(),
                "snapshot blob read-only segment"
            );
        }

        for (index, context) in contexts_compressed.iter().enumerate() {
            set_header_value(
                &mut data,
                format::context_offset_field(index as u32),
                payload_offset as u32,
            );
            payload_offset = write_segment(&mut data, payload_offset, &context.bytes);
            if options.profile {
                tracing::info!(
                    index,
                    bytes = context.bytes.len(),
                    chunks = contexts[index].reservations.len(),
                    "snapshot blob context segment"
                );
            }
        }
        debug_assert_eq!(payload_offset, total_length);

        // Last header write: the checksum field itself is outside the region
        // it protects, everything else must already be final.
        let computed = checksum(format::checksummed_region(&data));
        set_header_value(&mut data, format::CHECKSUM_OFFSET, computed);

        Ok(SnapshotBlob { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn raw_size(&self) -> usize {
        self.data.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Context count stored in the header. The count is not validated against
    /// the blob length here; use the extraction methods for that.
    pub fn num_contexts(&self) -> Result<u32> {
        self.header_value(format::NUM_CONTEXTS_OFFSET)
    }

    /// Whether hash-based structures inside the segments may be rehashed after
    /// load. A stored value outside `{0, 1}` means the blob is corrupt.
    pub fn rehashability(&self) -> Result<bool> {
        match self.header_value(format::REHASHABILITY_OFFSET)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SnapshotError::Corrupt("rehashability field is not 0 or 1")),
        }
    }

    pub fn stored_checksum(&self) -> Result<u32> {
        self.header_value(format::CHECKSUM_OFFSET)
    }

    /// Recompute the checksum over the protected region.
    pub fn compute_checksum(&self) -> u32 {
        checksum(format::checksummed_region(&self.data))
    }

    /// Recompute the checksum and compare it to the stored header field.
    ///
    /// A mismatch is reported, not fatal: the caller decides whether to
    /// reject, fall back, or escalate (boot paths escalate).
    pub fn verify_checksum(&self, options: &SnapshotOptions) -> Result<bool> {
        let start = Instant::now();
        let stored = self.stored_checksum()?;
        let computed = self.compute_checksum();
        if options.profile {
            tracing::info!(elapsed = ?start.elapsed(), "verified snapshot checksum");
        }
        Ok(stored == computed)
    }

    /// Compare the embedded version field against `expected`, byte for byte
    /// over the whole fixed-width field; truncation counts as a mismatch.
    ///
    /// A mismatched blob encodes struct shapes and field offsets from a
    /// different build, so the error carries both strings plus blob size and
    /// context count and is treated as fatal by callers.
    pub fn check_version(&self, expected: &str) -> Result<()> {
        let field = self
            .data
            .get(format::VERSION_STRING_OFFSET..format::READ_ONLY_OFFSET_OFFSET)
            .ok_or(SnapshotError::Corrupt("version field out of bounds"))?;
        let expected_field = encode_version_field(expected)?;
        if field != &expected_field[..] {
            let terminator = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            return Err(SnapshotError::VersionMismatch {
                binary_version: expected.to_owned(),
                snapshot_version: String::from_utf8_lossy(&field[..terminator]).into_owned(),
                raw_size: self.data.len(),
                num_contexts: self.num_contexts().unwrap_or(0),
            });
        }
        Ok(())
    }

    /// Startup segment: from the aligned end of the header to the read-only
    /// segment's offset.
    pub fn extract_startup_data(&self) -> Result<&[u8]> {
        let num_contexts = self.checked_num_contexts()?;
        let start = format::startup_snapshot_offset(num_contexts) as usize;
        let end = self.read_only_offset()? as usize;
        self.slice(start, end)
    }

    /// Read-only segment: bounded below by its header offset and above by
    /// context 0's offset, or by the end of the blob when there are no
    /// contexts (there is no context-0 offset field to bound it then).
    pub fn extract_read_only_data(&self) -> Result<&[u8]> {
        let num_contexts = self.checked_num_contexts()?;
        let start = self.read_only_offset()? as usize;
        let end = if num_contexts == 0 {
            self.data.len()
        } else {
            self.context_offset(0)? as usize
        };
        self.slice(start, end)
    }

    /// Context segment `index`: bounded above by the next context's offset,
    /// or by the end of the blob for the last context.
    pub fn extract_context_data(&self, index: u32) -> Result<&[u8]> {
        let num_contexts = self.checked_num_contexts()?;
        if index >= num_contexts {
            return Err(SnapshotError::Corrupt("context index out of range"));
        }
        let start = self.context_offset(index)? as usize;
        let end = if index == num_contexts - 1 {
            self.data.len()
        } else {
            self.context_offset(index + 1)? as usize
        };
        self.slice(start, end)
    }

    /// Whether a context snapshot could be looked up at `index`.
    ///
    /// Safe to call speculatively: never reports corruption, only presence.
    pub fn has_context_snapshot(&self, index: u32) -> bool {
        match self.num_contexts() {
            Ok(num_contexts) => index < num_contexts,
            Err(_) => false,
        }
    }

    fn header_value(&self, offset: usize) -> Result<u32> {
        let end = offset
            .checked_add(4)
            .ok_or(SnapshotError::Corrupt("header field offset overflow"))?;
        let bytes = self
            .data
            .get(offset..end)
            .ok_or(SnapshotError::Corrupt("header field out of bounds"))?;
        let mut field = [0u8; 4];
        field.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(field))
    }

    /// Context count with the guarantee that the whole context offset array
    /// lies inside the blob, so later offset-field reads cannot overflow.
    fn checked_num_contexts(&self) -> Result<u32> {
        let num_contexts = self.num_contexts()?;
        if format::header_len(num_contexts) > self.data.len() as u64 {
            return Err(SnapshotError::Corrupt(
                "context count inconsistent with blob length",
            ));
        }
        Ok(num_contexts)
    }

    fn read_only_offset(&self) -> Result<u32> {
        let offset = self.header_value(format::READ_ONLY_OFFSET_OFFSET)?;
        if offset as usize >= self.data.len() {
            return Err(SnapshotError::Corrupt("read-only offset past end of blob"));
        }
        Ok(offset)
    }

    fn context_offset(&self, index: u32) -> Result<u32> {
        let offset = self.header_value(format::context_offset_field(index))?;
        if offset as usize >= self.data.len() {
            return Err(SnapshotError::Corrupt("context offset past end of blob"));
        }
        Ok(offset)
    }

    /// Segment offsets must be strictly increasing and in bounds; anything
    /// else is a corrupted or adversarial blob.
    fn slice(&self, start: usize, end: usize) -> Result<&[u8]> {
        if start >= end {
            return Err(SnapshotError::Corrupt(
                "segment offsets not strictly increasing",
            ));
        }
        self.data
            .get(start..end)
            .ok_or(SnapshotError::Corrupt("segment range past end of blob"))
    }
}

fn set_header_value(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_segment(data: &mut [u8], offset: usize, bytes: &[u8]) -> usize {
    data[offset..offset + bytes.len()].copy_from_slice(bytes);
    offset + bytes.len()
}

fn encode_version_field(version: &str) -> Result<[u8; format::VERSION_STRING_LENGTH]> {
    let mut field = [0u8; format::VERSION_STRING_LENGTH];
    let bytes = version.as_bytes();
    if bytes.len() >= field.len() {
        return Err(SnapshotError::Corrupt(
            "version string does not fit the 64-byte field",
        ));
    }
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}

fn write_version_field(data: &mut [u8], version: &str) -> Result<()> {
    let field = encode_version_field(version)?;
    data[format::VERSION_STRING_OFFSET..format::READ_ONLY_OFFSET_OFFSET].copy_from_slice(&field);
    Ok(())
}

fn profile_reservations(startup: &SegmentData, read_only: &SegmentData, contexts: &[SegmentData]) {
    let per_instance = startup.reserved_bytes() + read_only.reserved_bytes();
    tracing::info!(bytes = per_instance, "deserialization will reserve per instance");
    for (index, context) in contexts.iter().enumerate() {
        tracing::info!(
            index,
            bytes = context.reserved_bytes(),
            "deserialization will reserve per context"
        );
    }
}
