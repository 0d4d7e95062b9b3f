use std::borrow::Cow;

use crate::error::{Result, SnapshotError};
use crate::types::SegmentData;

/// Segment compression strategy.
///
/// Chosen by the caller per assembly/extraction call rather than at build
/// time; both sides of a blob's lifecycle must agree on the same strategy
/// since the header has no field recording it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Lz4 = 1,
}

impl Compression {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            _ => Err(SnapshotError::Corrupt("invalid compression kind")),
        }
    }
}

/// Compress one encoded segment. Applied per segment, never across segment
/// boundaries.
///
/// Reservation metadata is not derivable from the compressed bytes, so it
/// travels alongside the payload unchanged.
pub fn compress_segment(segment: &SegmentData, kind: Compression) -> SegmentData {
    match kind {
        Compression::None => segment.clone(),
        Compression::Lz4 => SegmentData {
            bytes: lz4_flex::block::compress_prepend_size(&segment.bytes),
            reservations: segment.reservations.clone(),
        },
    }
}

/// Inverse of [`compress_segment`] for bytes sliced back out of a blob.
/// `Compression::None` borrows; `Lz4` allocates.
pub fn maybe_decompress(bytes: &[u8], kind: Compression) -> Result<Cow<'_, [u8]>> {
    match kind {
        Compression::None => Ok(Cow::Borrowed(bytes)),
        Compression::Lz4 => Ok(Cow::Owned(lz4_flex::block::decompress_size_prepended(
            bytes,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Reservation;

    #[test]
    fn none_is_identity() {
        let segment = SegmentData::new(b"payload".to_vec());
        let compressed = compress_segment(&segment, Compression::None);
        assert_eq!(compressed.bytes, segment.bytes);
        let back = maybe_decompress(&compressed.bytes, Compression::None).unwrap();
        assert!(matches!(back, Cow::Borrowed(_)));
        assert_eq!(&*back, b"payload");
    }

    #[test]
    fn lz4_round_trips() {
        let segment = SegmentData::new(vec![0xAB; 4096]);
        let compressed = compress_segment(&segment, Compression::Lz4);
        assert_ne!(compressed.bytes, segment.bytes);
        let back = maybe_decompress(&compressed.bytes, Compression::Lz4).unwrap();
        assert_eq!(&*back, &segment.bytes[..]);
    }

    #[test]
    fn reservations_travel_out_of_band() {
        let segment = SegmentData::with_reservations(
            vec![1, 2, 3],
            vec![Reservation { chunk_size: 4096 }, Reservation { chunk_size: 64 }],
        );
        let compressed = compress_segment(&segment, Compression::Lz4);
        assert_eq!(compressed.reservations, segment.reservations);
    }

    #[test]
    fn garbage_lz4_input_is_an_error() {
        assert!(maybe_decompress(&[0xFF; 3], Compression::Lz4).is_err());
    }
}
