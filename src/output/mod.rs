//! Record streams and reports.
//!
//! - [`jsonl`]: JSON-Lines reading and writing for scan reports, tag files
//!   and the operation log
//! - [`csv`]: one-row-per-file duplicate group report for spreadsheets
//!
//! # Example
//!
//! ```no_run
//! use drivetidy::output::jsonl::read_json_lines;
//! use drivetidy::scanner::FileRecord;
//! use std::path::Path;
//!
//! let records: Vec<FileRecord> = read_json_lines(Path::new("scan.jsonl")).unwrap();
//! println!("{} records", records.len());
//! ```

pub mod csv;
pub mod jsonl;

// Re-export main types
pub use csv::{CsvOutput, CsvOutputError};
pub use jsonl::{read_json_lines, read_json_lines_lenient, JsonLinesError, JsonLinesWriter};
