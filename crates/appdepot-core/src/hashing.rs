//! SHA-256 content hashing helpers

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Hash a byte slice, returning the lowercase hex digest
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Hash a file's contents, returning the lowercase hex digest
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify the integrity of downloaded content against an expected SHA-256 hash.
///
/// If `expected_hash` is `Some`, the content is hashed and compared. A mismatch
/// causes an error. If `expected_hash` is `None`, a warning is logged but the
/// operation succeeds (graceful degradation for records without checksums).
pub fn verify_content_integrity(
    content: &[u8],
    name: &str,
    expected_hash: Option<&str>,
) -> Result<()> {
    let actual = sha256_hex(content);

    match expected_hash {
        Some(expected) => {
            if actual != expected.to_lowercase() {
                return Err(Error::IntegrityMismatch {
                    name: name.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            debug!("'{}' passed integrity check (SHA-256: {})", name, actual);
        }
        None => {
            warn!("No checksum available for '{}'", name);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256 of "hello world"
    const HELLO_HASH: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_hex() {
        assert_eq!(sha256_hex(b"hello world"), HELLO_HASH);
    }

    #[test]
    fn test_sha256_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        std::fs::write(&path, b"hello world").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_HASH);
    }

    #[test]
    fn test_verify_matching_hash() {
        verify_content_integrity(b"hello world", "pkg", Some(HELLO_HASH))
            .expect("matching hash should verify");
    }

    #[test]
    fn test_verify_mismatched_hash() {
        let wrong = "0000000000000000000000000000000000000000000000000000000000000000";
        let err = verify_content_integrity(b"hello world", "pkg", Some(wrong)).unwrap_err();
        assert!(err.to_string().contains("Integrity check failed"));
    }

    #[test]
    fn test_verify_no_hash_succeeds() {
        verify_content_integrity(b"anything", "pkg", None)
            .expect("missing expected hash should degrade gracefully");
    }

    #[test]
    fn test_verify_case_insensitive() {
        let upper = HELLO_HASH.to_uppercase();
        verify_content_integrity(b"hello world", "pkg", Some(&upper))
            .expect("uppercase hex should verify");
    }
}
