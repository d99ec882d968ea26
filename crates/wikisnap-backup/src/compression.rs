//! Compression settings and archive checksums.

use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use wikisnap_core::Result;

/// Default compression level (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Checksum algorithm recorded in run manifests.
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Gzip level for `level`, clamped to 1-9.
pub fn gzip_level(level: u32) -> Compression {
    Compression::new(level.clamp(1, 9))
}

/// Calculates SHA256 checksum of a file.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    let hash = hasher.finalize();
    Ok(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_calculate_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.txt");
        std::fs::write(&path, b"Test content for checksum").unwrap();

        let checksum1 = calculate_checksum(&path).unwrap();
        let checksum2 = calculate_checksum(&path).unwrap();

        assert_eq!(checksum1, checksum2);
        assert_eq!(checksum1.len(), 64);
    }

    #[test]
    fn test_checksum_known_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        std::fs::write(&path, b"").unwrap();

        assert_eq!(
            calculate_checksum(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(calculate_checksum(&temp_dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_gzip_level_is_clamped() {
        assert_eq!(gzip_level(0).level(), 1);
        assert_eq!(gzip_level(6).level(), 6);
        assert_eq!(gzip_level(12).level(), 9);
    }
}
