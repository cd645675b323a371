//! Copy integrity check.
//! SHA-256 over the whole file, streamed in 64 KiB chunks.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

use crate::errors::MoveError;

/// Hex SHA-256 of the file at `path`.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compare the digests of `source` and `destination`.
/// A difference is reported as [`MoveError::Integrity`], distinct from I/O failures.
pub fn verify_copy(source: &Path, destination: &Path) -> Result<(), MoveError> {
    let source_digest = sha256_file(source).map_err(MoveError::io("hash source", source))?;
    let destination_digest =
        sha256_file(destination).map_err(MoveError::io("hash destination", destination))?;

    if source_digest != destination_digest {
        return Err(MoveError::Integrity {
            source_path: source.to_path_buf(),
            source_digest,
            destination_path: destination.to_path_buf(),
            destination_digest,
        });
    }

    debug!(digest = %source_digest, path = %destination.display(), "SHA256 verification passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn known_digest() {
        let td = tempdir().unwrap();
        let p = td.path().join("abc");
        fs::write(&p, b"abc").unwrap();
        assert_eq!(
            sha256_file(&p).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn equal_files_verify() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        verify_copy(&a, &b).unwrap();
    }

    #[test]
    fn different_files_report_integrity_error() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        let b = td.path().join("b");
        fs::write(&a, b"original").unwrap();
        fs::write(&b, b"corrupted").unwrap();
        let err = verify_copy(&a, &b).unwrap_err();
        assert!(err.is_integrity());
        assert!(err.to_string().starts_with("Hashes don't match"));
    }

    #[test]
    fn missing_destination_is_io_error() {
        let td = tempdir().unwrap();
        let a = td.path().join("a");
        fs::write(&a, b"x").unwrap();
        let err = verify_copy(&a, &td.path().join("missing")).unwrap_err();
        assert!(!err.is_integrity());
        assert_eq!(err.kind(), "io");
    }
}
