//! Per-record CRC-32C (Castagnoli) integrity checksum.
//!
//! Gates record visibility: a descriptor's stored checksum is compared against
//! a freshly computed one on every validated read and during data-area
//! compaction with validation (the only path that runs at open). A mismatch
//! never raises an error — it makes the record invisible, per §7.

/// Computes the CRC-32C checksum of `data`, little-endian result.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        let data = b"persistent dynamic table";
        assert_eq!(checksum(data), checksum(data));
    }

    #[test]
    fn checksum_detects_single_bit_flip() {
        let mut data = b"persistent dynamic table".to_vec();
        let original = checksum(&data);
        data[0] ^= 0x01;
        assert_ne!(checksum(&data), original);
    }

    #[test]
    fn checksum_of_empty_slice_is_zero() {
        assert_eq!(checksum(&[]), 0);
    }
}
