//! Locality-sensitive hash for near-duplicate binary content.
//!
//! The first [`FUZZY_WINDOW`] bytes are cut into 8-byte shingles taken every
//! 4 bytes. Each shingle becomes a hex token and the token stream is folded
//! into a 64-bit SimHash, so files that share most of their shingles end up
//! a small Hamming distance apart.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Only this many leading bytes contribute to the fuzzy hash.
pub const FUZZY_WINDOW: usize = 1024 * 1024;

/// Inputs shorter than this carry too little signal and get no fuzzy hash.
pub const MIN_FUZZY_INPUT: usize = 64;

const SHINGLE_LEN: usize = 8;
const SHINGLE_STRIDE: usize = 4;

/// Fuzzy hash of an in-memory buffer, or `None` when the input is too short.
#[must_use]
pub fn fuzzy_hash_bytes(data: &[u8]) -> Option<String> {
    if data.len() < MIN_FUZZY_INPUT {
        return None;
    }
    let data = &data[..data.len().min(FUZZY_WINDOW)];

    let shingles = (data.len() - SHINGLE_LEN) / SHINGLE_STRIDE + 1;
    let mut tokens = String::with_capacity(shingles * (SHINGLE_LEN * 2 + 1));
    for start in (0..=data.len() - SHINGLE_LEN).step_by(SHINGLE_STRIDE) {
        for byte in &data[start..start + SHINGLE_LEN] {
            let _ = write!(tokens, "{byte:02x}");
        }
        tokens.push(' ');
    }

    Some(format!("{:016x}", simhash::simhash(&tokens)))
}

/// Fuzzy hash of the leading window of a file.
///
/// # Errors
///
/// Returns the underlying I/O error if the file cannot be read.
pub fn fuzzy_hash_file(path: &Path) -> io::Result<Option<String>> {
    let file = File::open(path)?;
    let mut data = Vec::new();
    file.take(FUZZY_WINDOW as u64).read_to_end(&mut data)?;
    Ok(fuzzy_hash_bytes(&data))
}

/// Hamming distance between two fuzzy hashes, `None` if either is malformed.
#[must_use]
pub fn fuzzy_distance(a: &str, b: &str) -> Option<u32> {
    let a = u64::from_str_radix(a, 16).ok()?;
    let b = u64::from_str_radix(b, 16).ok()?;
    Some((a ^ b).count_ones())
}
