/// CRC-32 (IEEE) over `bytes`.
///
/// Corruption detection only, not an authenticity guarantee: a blob shipping
/// next to a binary is trusted-but-verified, and a failed check means the
/// bytes were damaged in transit or on disk.
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}
