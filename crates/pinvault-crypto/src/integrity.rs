//! SHA-256 content hashing and verification

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// True when `data` hashes to `expected_hash` (hex, case-insensitive).
pub fn verify_integrity(data: &[u8], expected_hash: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected_hash.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_case_insensitive() {
        let hash = sha256_hex(b"payload").to_uppercase();
        assert!(verify_integrity(b"payload", &hash));
    }

    #[test]
    fn test_verify_rejects_other_content() {
        let hash = sha256_hex(b"payload-a");
        assert!(!verify_integrity(b"payload-b", &hash));
    }
}
