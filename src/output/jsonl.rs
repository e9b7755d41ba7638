//! JSON-Lines reading and writing.
//!
//! Scan reports, tag files and the operation log are all streams of one
//! self-contained JSON object per line. Each line is serialized in memory and
//! written with a single `write_all`, so a reader tailing the file never sees
//! half a record.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors while reading or writing JSON-Lines.
#[derive(Debug, Error)]
pub enum JsonLinesError {
    /// The underlying reader or writer failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File (or `<stream>`) being processed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// One line did not hold the expected object.
    #[error("{path}:{line}: invalid record: {source}")]
    Parse {
        /// File being read
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// Decoding error
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Writes one JSON object per line.
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesWriter<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Serialize `value` and append it as one line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<(), JsonLinesError> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .map_err(|source| JsonLinesError::Io {
                path: PathBuf::from("<stream>"),
                source,
            })?;
        self.written += 1;
        Ok(())
    }

    /// Number of lines written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the inner writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn finish(mut self) -> Result<W, JsonLinesError> {
        self.writer.flush().map_err(|source| JsonLinesError::Io {
            path: PathBuf::from("<stream>"),
            source,
        })?;
        Ok(self.writer)
    }
}

/// Parse every non-blank line of `reader`; the first bad line is an error.
///
/// `origin` only labels error messages.
///
/// # Errors
///
/// Returns [`JsonLinesError::Parse`] with the line number of the first
/// malformed line, or [`JsonLinesError::Io`] if reading fails.
pub fn read_json_lines_from<T, R>(reader: R, origin: &Path) -> Result<Vec<T>, JsonLinesError>
where
    T: DeserializeOwned,
    R: BufRead,
{
    let mut items = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| JsonLinesError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| JsonLinesError::Parse {
            path: origin.to_path_buf(),
            line: index + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Read a JSON-Lines file strictly.
///
/// # Errors
///
/// See [`read_json_lines_from`]; also fails if the file cannot be opened.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, JsonLinesError> {
    let file = File::open(path).map_err(|source| JsonLinesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_json_lines_from(BufReader::new(file), path)
}

/// Read a JSON-Lines file, warning about and skipping malformed lines.
///
/// Used where a torn final line (a crash mid-append) must not hide the
/// records before it.
///
/// # Errors
///
/// Fails only if the file cannot be opened or read.
pub fn read_json_lines_lenient<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, JsonLinesError> {
    let file = File::open(path).map_err(|source| JsonLinesError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut items = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| JsonLinesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("{}:{}: skipping malformed line: {}", path.display(), index + 1, e),
        }
    }
    Ok(items)
}
