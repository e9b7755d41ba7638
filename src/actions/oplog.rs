//! Append-only operation log.
//!
//! Every mutation is recorded as one JSON line
//! `{"action": "move"|"hardlink"|"copy", "src", "dst", "timestamp"}`.
//! Each append is a single `write_all` followed by `sync_data`, so a record is
//! durable before the engine moves on. The file is opened once, before a
//! batch starts; appends from several threads are ordered by a mutex.
//!
//! The engine writes ahead: the same line with `"state": "pending"` (and,
//! for hardlink/copy, the `aside` path of the parked original) precedes
//! every attempt, and is followed by the plain record on success or by
//! `"state": "aborted"` on failure. [`read_log`] folds each pair back into
//! one record, so only completed mutations and interrupted ones remain.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::output::jsonl::{read_json_lines_lenient, JsonLinesError};

/// Kind of filesystem mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Relocate the file
    Move,
    /// Replace the file with a hard link to another
    #[serde(alias = "hardlink_to")]
    Hardlink,
    /// Replace the file with a copy of another
    #[serde(alias = "copy_from")]
    Copy,
}

impl MutationKind {
    /// Lowercase name as written to the log.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Hardlink => "hardlink",
            Self::Copy => "copy",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MutationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(Self::Move),
            "hardlink" => Ok(Self::Hardlink),
            "copy" => Ok(Self::Copy),
            other => Err(crate::scanner::fingerprint::unknown_name_message(
                "link mode",
                other,
                &["move", "hardlink", "copy"],
            )),
        }
    }
}

/// Where a record stands in the write-ahead protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    /// The mutation completed
    #[default]
    Done,
    /// Written before the mutation is attempted
    Pending,
    /// The pending mutation failed and left the files as they were
    Aborted,
}

impl RecordState {
    fn is_done(&self) -> bool {
        *self == Self::Done
    }
}

/// One logged mutation.
///
/// For `move`, `src` is where the file was and `dst` where it went. For
/// `hardlink` and `copy`, `src` is the replaced file and `dst` the keeper
/// whose content now lives at `src`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Kind of mutation
    pub action: MutationKind,
    /// Original path
    pub src: PathBuf,
    /// Destination (move) or content source (hardlink/copy)
    pub dst: PathBuf,
    /// When the record was written
    #[serde(alias = "time")]
    pub timestamp: DateTime<Utc>,
    /// Write-ahead state; omitted for completed mutations
    #[serde(default, skip_serializing_if = "RecordState::is_done")]
    pub state: RecordState,
    /// Parked original of a hardlink/copy in flight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aside: Option<PathBuf>,
}

impl MutationRecord {
    /// Record a mutation completed now.
    #[must_use]
    pub fn now(action: MutationKind, src: PathBuf, dst: PathBuf) -> Self {
        Self {
            action,
            src,
            dst,
            timestamp: Utc::now(),
            state: RecordState::Done,
            aside: None,
        }
    }

    /// Intent to attempt a mutation, written before anything is touched.
    #[must_use]
    pub fn pending(action: MutationKind, src: PathBuf, dst: PathBuf, aside: Option<PathBuf>) -> Self {
        Self {
            state: RecordState::Pending,
            aside,
            ..Self::now(action, src, dst)
        }
    }

    /// Same record in another state, stamped now.
    #[must_use]
    pub fn with_state(mut self, state: RecordState) -> Self {
        self.state = state;
        self.timestamp = Utc::now();
        self
    }

    /// True when the outcome of the mutation was never recorded.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == RecordState::Pending
    }

    fn settles(&self, pending: &MutationRecord) -> bool {
        self.state != RecordState::Pending && self.action == pending.action && self.src == pending.src
    }
}

/// Errors from the operation log.
#[derive(Debug, Error)]
pub enum OpLogError {
    /// The log file could not be opened for appending.
    #[error("cannot open operation log {path}: {source}")]
    Open {
        /// Log path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// A record could not be written durably.
    #[error("cannot append to operation log {path}: {source}")]
    Append {
        /// Log path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The log could not be read back.
    #[error("cannot read operation log: {0}")]
    Read(#[from] JsonLinesError),

    /// Another thread panicked while appending.
    #[error("operation log lock poisoned")]
    LockPoisoned,
}

/// Handle to an open operation log.
#[derive(Debug)]
pub struct OperationLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl OperationLog {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`OpLogError::Open`] if the directory or file cannot be created.
    pub fn open(path: &Path) -> Result<Self, OpLogError> {
        let open_err = |source| OpLogError::Open {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(open_err)?;

        log::debug!("Operation log: {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record and flush it to stable storage.
    ///
    /// # Errors
    ///
    /// Returns [`OpLogError::Append`] if the write or the sync fails.
    pub fn append(&self, record: &MutationRecord) -> Result<(), OpLogError> {
        let mut line = serde_json::to_string(record).map_err(|e| OpLogError::Append {
            path: self.path.clone(),
            source: io::Error::other(e),
        })?;
        line.push('\n');

        let mut file = self.file.lock().map_err(|_| OpLogError::LockPoisoned)?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .and_then(|()| file.sync_data())
            .map_err(|source| OpLogError::Append {
                path: self.path.clone(),
                source,
            })?;
        log::trace!("Logged {} {} -> {}", record.action, record.src.display(), record.dst.display());
        Ok(())
    }
}

/// Read the records of a log in write order, with write-ahead pairs folded.
///
/// Blank lines are ignored and malformed lines are skipped with a warning,
/// so a torn final line does not hide earlier records.
///
/// # Errors
///
/// Fails only if the file cannot be opened or read.
pub fn read_log(path: &Path) -> Result<Vec<MutationRecord>, OpLogError> {
    Ok(resolve_journal(read_json_lines_lenient(path)?))
}

/// Fold write-ahead records.
///
/// A pending record followed by its outcome is replaced by that outcome,
/// and aborted attempts disappear. A pending record without an outcome is
/// kept: the process stopped while that mutation was in flight.
#[must_use]
pub fn resolve_journal(raw: Vec<MutationRecord>) -> Vec<MutationRecord> {
    let mut resolved = Vec::with_capacity(raw.len());
    let mut records = raw.into_iter().peekable();
    while let Some(record) = records.next() {
        match record.state {
            RecordState::Done => resolved.push(record),
            RecordState::Aborted => {}
            RecordState::Pending => {
                if !records.peek().is_some_and(|next| next.settles(&record)) {
                    log::warn!(
                        "Interrupted {} of {} in operation log",
                        record.action,
                        record.src.display()
                    );
                    resolved.push(record);
                }
            }
        }
    }
    resolved
}
