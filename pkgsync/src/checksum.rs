//! Content digest calculation for package validation.
//!
//! Package identity is its content digest. The catalog publishes MD5 digests;
//! SHA-256 digests are accepted as well and told apart by their hex length.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::error::{SyncError, SyncResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Digest algorithms understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Infer the algorithm from a hex digest.
    ///
    /// Returns `None` when the length matches no supported algorithm.
    pub fn for_digest(hex_digest: &str) -> Option<Self> {
        match hex_digest.len() {
            32 => Some(Self::Md5),
            64 => Some(Self::Sha256),
            _ => None,
        }
    }
}

fn hash_reader<D: Digest>(path: &Path, mut file: File) -> SyncResult<String> {
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Calculate the digest of a file.
///
/// # Returns
///
/// The lowercase hexadecimal digest of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path, algorithm: DigestAlgorithm) -> SyncResult<String> {
    let file = File::open(path).map_err(|e| SyncError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    match algorithm {
        DigestAlgorithm::Md5 => hash_reader::<Md5>(path, file),
        DigestAlgorithm::Sha256 => hash_reader::<Sha256>(path, file),
    }
}

/// Verify that a file matches an expected digest.
///
/// The comparison is case-insensitive. A digest of unsupported length is
/// reported as a mismatch.
pub fn verify_checksum(path: &Path, expected: &str) -> SyncResult<()> {
    let mismatch = |actual: String| SyncError::PackageIntegrity {
        file: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
        expected: expected.to_string(),
        actual,
    };

    let algorithm =
        DigestAlgorithm::for_digest(expected).ok_or_else(|| mismatch("<unsupported>".into()))?;
    let actual = calculate_file_checksum(path, algorithm)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(mismatch(actual));
    }
    Ok(())
}

/// Check whether a local file is a valid copy of the given digest.
///
/// Missing or unreadable files are invalid; I/O errors never escape.
pub fn is_valid(path: &Path, expected: &str) -> bool {
    path.is_file() && verify_checksum(path, expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_hello(temp: &TempDir) -> std::path::PathBuf {
        let file_path = temp.path().join("test.txt");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"hello world").unwrap();
        file_path
    }

    #[test]
    fn test_calculate_md5() {
        let temp = TempDir::new().unwrap();
        let file_path = write_hello(&temp);

        let checksum = calculate_file_checksum(&file_path, DigestAlgorithm::Md5).unwrap();
        assert_eq!(checksum, HELLO_MD5);
    }

    #[test]
    fn test_calculate_sha256() {
        let temp = TempDir::new().unwrap();
        let file_path = write_hello(&temp);

        let checksum = calculate_file_checksum(&file_path, DigestAlgorithm::Sha256).unwrap();
        assert_eq!(checksum, HELLO_SHA256);
    }

    #[test]
    fn test_calculate_empty_file() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("empty.txt");
        File::create(&file_path).unwrap();

        let checksum = calculate_file_checksum(&file_path, DigestAlgorithm::Md5).unwrap();
        assert_eq!(checksum, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_calculate_nonexistent_file() {
        let result =
            calculate_file_checksum(Path::new("/nonexistent/file.txt"), DigestAlgorithm::Md5);
        assert!(matches!(result, Err(SyncError::ReadFailed { .. })));
    }

    #[test]
    fn test_algorithm_inference() {
        assert_eq!(
            DigestAlgorithm::for_digest(HELLO_MD5),
            Some(DigestAlgorithm::Md5)
        );
        assert_eq!(
            DigestAlgorithm::for_digest(HELLO_SHA256),
            Some(DigestAlgorithm::Sha256)
        );
        assert_eq!(DigestAlgorithm::for_digest("aa11"), None);
    }

    #[test]
    fn test_verify_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let file_path = write_hello(&temp);

        assert!(verify_checksum(&file_path, &HELLO_MD5.to_uppercase()).is_ok());
        assert!(is_valid(&file_path, &HELLO_SHA256.to_uppercase()));
    }

    #[test]
    fn test_verify_checksum_mismatch() {
        let temp = TempDir::new().unwrap();
        let file_path = write_hello(&temp);

        let result = verify_checksum(&file_path, "d41d8cd98f00b204e9800998ecf8427e");
        match result {
            Err(SyncError::PackageIntegrity { file, actual, .. }) => {
                assert_eq!(file, "test.txt");
                assert_eq!(actual, HELLO_MD5);
            }
            _ => panic!("Expected PackageIntegrity error"),
        }
    }

    #[test]
    fn test_is_valid_missing_file() {
        assert!(!is_valid(Path::new("/nonexistent/file.txt"), HELLO_MD5));
    }

    #[test]
    fn test_is_valid_unsupported_digest() {
        let temp = TempDir::new().unwrap();
        let file_path = write_hello(&temp);

        assert!(!is_valid(&file_path, "aa11"));
    }

    #[test]
    fn test_large_file_checksum() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("large.bin");

        // Larger than the read buffer
        let mut file = File::create(&file_path).unwrap();
        file.write_all(&vec![0xABu8; 100_000]).unwrap();

        let first = calculate_file_checksum(&file_path, DigestAlgorithm::Sha256).unwrap();
        let second = calculate_file_checksum(&file_path, DigestAlgorithm::Sha256).unwrap();
        assert_eq!(first, second);
        assert!(is_valid(&file_path, &first));
    }
}
