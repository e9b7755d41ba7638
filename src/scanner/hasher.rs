//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! The `exact` fingerprint namespace is a BLAKE3 digest of the whole file.
//! Small files are streamed through a fixed-size buffer; files at or above
//! [`MMAP_THRESHOLD`] are hashed through a memory map, which lets the OS
//! page the content in without copying it through user space.
//!
//! # Example
//!
//! ```no_run
//! use drivetidy::scanner::hasher::{hash_to_hex, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let hash = hasher.full_hash(Path::new("photo.png")).unwrap();
//! println!("{}", hash_to_hex(&hash));
//! ```

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Read buffer used for streaming hashes.
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Files at least this large are hashed through a memory map.
pub const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Streaming BLAKE3 hasher for file content.
#[derive(Debug, Clone)]
pub struct Hasher {
    mmap_threshold: u64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default memory-map threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mmap_threshold: MMAP_THRESHOLD,
        }
    }

    /// Override the size at which files are hashed through a memory map.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Hash the complete content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();

        let mut hasher = blake3::Hasher::new();
        if len >= self.mmap_threshold {
            log::trace!("Hashing {} through mmap ({} bytes)", path.display(), len);
            hasher
                .update_mmap(path)
                .map_err(|e| HashError::from_io(path, e))?;
        } else {
            stream_into(file, &mut hasher).map_err(|e| HashError::from_io(path, e))?;
        }

        Ok(*hasher.finalize().as_bytes())
    }

    /// Hash everything a reader produces.
    ///
    /// # Errors
    ///
    /// Propagates read errors from `reader`.
    pub fn hash_reader<R: Read>(&self, reader: R) -> io::Result<Hash> {
        let mut hasher = blake3::Hasher::new();
        stream_into(reader, &mut hasher)?;
        Ok(*hasher.finalize().as_bytes())
    }
}

fn stream_into<R: Read>(mut reader: R, hasher: &mut blake3::Hasher) -> io::Result<()> {
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
}

/// Lowercase hex form of a digest.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a 64-character hex digest.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex).ok().map(|h| *h.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("Failed to write test file");
        path
    }

    #[test]
    fn test_full_hash_matches_blake3() {
        let dir = TempDir::new().unwrap();
        let path = create_temp_file(&dir, "a.txt", b"hello world");

        let hash = Hasher::new().full_hash(&path).unwrap();
        assert_eq!(hash, *blake3::hash(b"hello world").as_bytes());
    }

    #[test]
    fn test_empty_file_hash_is_well_defined() {
        let dir = TempDir::new().unwrap();
        let path = create_temp_file(&dir, "empty.bin", b"");

        let hash = Hasher::new().full_hash(&path).unwrap();
        assert_eq!(hash, *blake3::hash(b"").as_bytes());
    }

    #[test]
    fn test_mmap_path_matches_streaming() {
        let dir = TempDir::new().unwrap();
        let content = vec![7u8; 200_000];
        let path = create_temp_file(&dir, "big.bin", &content);

        let streamed = Hasher::new().full_hash(&path).unwrap();
        let mapped = Hasher::new()
            .with_mmap_threshold(1)
            .full_hash(&path)
            .unwrap();
        assert_eq!(streamed, mapped);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = Hasher::new().full_hash(&dir.path().join("nope"));
        assert!(matches!(result, Err(HashError::NotFound(_))));
    }

    #[test]
    fn test_hex_round_trip() {
        let hash = *blake3::hash(b"abc").as_bytes();
        let hex = hash_to_hex(&hash);
        assert_eq!(hex.len(), 64);
        assert_eq!(hex_to_hash(&hex), Some(hash));
        assert_eq!(hex_to_hash("zz"), None);
    }
}
