//! CRC32 checksums for persisted collection units
//!
//! Uses CRC32 (IEEE polynomial). The checksum covers the serialized
//! document array exactly as written.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = br#"[{"_id":"a","name":"John"}]"#;
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let data = br#"[{"_id":"a","age":30}]"#.to_vec();
        let checksum = compute_checksum(&data);
        let mut damaged = data.clone();
        damaged[15] = b'4';
        assert!(verify_checksum(&data, checksum));
        assert!(!verify_checksum(&damaged, checksum));
    }
}
