//! CSV report of duplicate groups.
//!
//! One row per file:
//!
//! - `group_id`: 1-based group number within the namespace
//! - `namespace`: fingerprint namespace the group was formed in
//! - `fingerprint`: shared fingerprint value
//! - `path`: absolute path
//! - `size`: bytes
//! - `modified`: RFC 3339, UTC
//! - `keeper`: `true` for the file the policy keeps

use std::io;
use std::path::Path;

use chrono::DateTime;
use serde::Serialize;
use thiserror::Error;

use crate::duplicates::{select_keeper, DuplicateGroup, KeeperPolicy};

/// Errors while writing the CSV report.
#[derive(Debug, Error)]
pub enum CsvOutputError {
    /// I/O error during writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during CSV serialization.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    group_id: usize,
    namespace: &'static str,
    fingerprint: &'a str,
    path: String,
    size: u64,
    modified: String,
    keeper: bool,
}

/// CSV formatter over a slice of groups.
pub struct CsvOutput<'a> {
    groups: &'a [DuplicateGroup],
    policy: KeeperPolicy,
}

impl<'a> CsvOutput<'a> {
    /// Format `groups`, marking keepers chosen by `policy`.
    #[must_use]
    pub fn new(groups: &'a [DuplicateGroup], policy: KeeperPolicy) -> Self {
        Self { groups, policy }
    }

    /// Write header and rows to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: io::Write>(&self, writer: W) -> Result<(), CsvOutputError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        for (index, group) in self.groups.iter().enumerate() {
            let keeper = select_keeper(&group.files, self.policy);
            for file in &group.files {
                csv_writer.serialize(CsvRow {
                    group_id: index + 1,
                    namespace: group.namespace.as_str(),
                    fingerprint: &group.fingerprint,
                    path: file.path.to_string_lossy().into_owned(),
                    size: file.size,
                    modified: format_modified(file.modified),
                    keeper: keeper.is_some_and(|k| std::ptr::eq(k, file)),
                })?;
            }
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write the report to `path`, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_to_path(&self, path: &Path) -> Result<(), CsvOutputError> {
        let file = std::fs::File::create(path)?;
        self.write_to(io::BufWriter::new(file))
    }

    /// Render to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string(&self) -> Result<String, CsvOutputError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn format_modified(seconds: f64) -> String {
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}
