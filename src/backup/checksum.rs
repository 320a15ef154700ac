//! Content digests for backup artifacts
//!
//! Digests are rendered as `sha256:<hex>`. Verification is advisory: a
//! mismatch is logged and reported, never turned into a hard failure.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{SweepError, SweepResult};

/// Prefix of every digest this crate produces
pub const SHA256_PREFIX: &str = "sha256:";

/// Compute the `sha256:<hex>` digest of a file
///
/// Zero-length files are digested normally; only unreadable paths fail.
pub fn checksum(path: &Path) -> SweepResult<String> {
    let file = File::open(path).map_err(|e| SweepError::ChecksumFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(|e| SweepError::ChecksumFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(format!("{}{}", SHA256_PREFIX, hex::encode(hasher.finalize())))
}

/// Split an expected digest into its bare hex form
///
/// A missing prefix means sha256; any other algorithm prefix has no
/// implementation here.
fn expected_hex(expected: &str) -> SweepResult<String> {
    let expected = expected.trim();
    if let Some(hex) = expected.strip_prefix(SHA256_PREFIX) {
        return Ok(hex.to_ascii_lowercase());
    }
    match expected.split_once(':') {
        Some((algorithm, _)) => Err(SweepError::ChecksumUnavailable(format!(
            "no digest implementation for '{}'",
            algorithm
        ))),
        None => Ok(expected.to_ascii_lowercase()),
    }
}

/// Check a file against an expected digest, with or without the prefix
///
/// Returns `false` on mismatch and when the digest cannot be computed;
/// both are logged as warnings.
pub fn verify(path: &Path, expected: &str) -> bool {
    match try_verify(path, expected) {
        Ok(true) => true,
        Ok(false) => {
            warn!(path = %path.display(), expected, "Checksum mismatch");
            false
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Checksum could not be verified");
            false
        }
    }
}

/// Like [`verify`] but surfaces why a digest could not be computed
pub fn try_verify(path: &Path, expected: &str) -> SweepResult<bool> {
    let wanted = expected_hex(expected)?;
    let actual = checksum(path)?;
    Ok(actual[SHA256_PREFIX.len()..] == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // sha256("hello world")
    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    // sha256("")
    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_checksum_format() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, b"hello world").unwrap();

        assert_eq!(checksum(&path).unwrap(), format!("sha256:{}", HELLO));
    }

    #[test]
    fn test_checksum_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        fs::write(&path, b"").unwrap();

        assert_eq!(checksum(&path).unwrap(), format!("sha256:{}", EMPTY));
    }

    #[test]
    fn test_checksum_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = checksum(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, SweepError::ChecksumFailed { .. }));
    }

    #[test]
    fn test_verify_with_and_without_prefix() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, b"hello world").unwrap();

        assert!(verify(&path, &format!("sha256:{}", HELLO)));
        assert!(verify(&path, HELLO));
        assert!(verify(&path, &HELLO.to_uppercase()));
        assert!(!verify(&path, EMPTY));
    }

    #[test]
    fn test_verify_unknown_algorithm() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, b"hello world").unwrap();

        let err = try_verify(&path, "md5:5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap_err();
        assert!(matches!(err, SweepError::ChecksumUnavailable(_)));
        assert!(!verify(&path, "md5:5eb63bbbe01eeed093cb22bb8f5acdc3"));
    }
}
