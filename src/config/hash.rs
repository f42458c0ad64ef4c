//! Presentation file digests for change detection.
//!
//! The platform reports the size and MD5 of every uploaded presentation.
//! Comparing the local file against those two values tells whether it has to
//! be uploaded again. Digests are computed on demand and never cached.

use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

/// Size of the read buffer used while hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Hasher for presentation files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentHasher;

impl ContentHasher {
    /// Creates a new content hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the size of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn file_size(&self, path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    /// Computes the hex-encoded MD5 of a file, reading it in chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn md5_file(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Md5::new();
        let mut buffer = vec![0_u8; CHUNK_SIZE];

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Computes the hex-encoded MD5 of a byte slice.
    #[must_use]
    pub fn md5_bytes(&self, bytes: &[u8]) -> String {
        hex::encode(Md5::digest(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_known_value() {
        let hasher = ContentHasher::new();
        assert_eq!(hasher.md5_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            hasher.md5_bytes(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn test_md5_file_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slides.pdf");
        let content: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let hasher = ContentHasher::new();
        assert_eq!(hasher.file_size(&path).unwrap(), 200_000);
        assert_eq!(hasher.md5_file(&path).unwrap(), hasher.md5_bytes(&content));
    }

    #[test]
    fn test_missing_file() {
        let hasher = ContentHasher::new();
        assert!(hasher.md5_file(Path::new("/nonexistent/slides.pdf")).is_err());
        assert!(hasher.file_size(Path::new("/nonexistent/slides.pdf")).is_err());
    }
}
