//! Reversible file mutations with logging.
//!
//! # Overview
//!
//! The [`MutationEngine`] executes a list of [`PlannedMutation`]s one at a
//! time. Each item is either completed and logged, skipped (the file is
//! gone, unreadable or changed since the scan) or failed (conflict,
//! unsupported operation, I/O error). Neither a skip nor a failure stops the
//! batch.
//!
//! # Durability
//!
//! The log is written ahead of the filesystem. Before an item is touched a
//! `pending` record naming it is appended and synced; if that append fails
//! the batch stops with [`BatchError::LogWrite`] and the item is never
//! attempted. A failed attempt is closed with an `aborted` record, a
//! completed one with the plain record.
//!
//! A replaced file is first renamed to the `<name>.to_delete` path carried in
//! the pending record, the new content is put in place, the completion
//! record is synced, and only then is the aside copy removed. If the
//! completion record cannot be written the item is rolled back and the
//! batch stops.
//!
//! After a crash between the pending record and its outcome, undo works
//! out from the filesystem whether the item happened: a move whose source
//! is still present never ran, and a surviving aside file is the original
//! content. Two leftovers remain possible next to an intact source: a second
//! name for the file at the destination when a move stops between its link
//! and its unlink, and a partial file when a cross-device copy is cut short.
//!
//! Moves never replace an existing destination, even one created after the
//! conflict check (see [`fsops::move_file`]).
//!
//! # Example
//!
//! ```no_run
//! use drivetidy::actions::mutate::{MutationConfig, MutationEngine, PlannedMutation};
//! use drivetidy::actions::oplog::OperationLog;
//! use std::path::{Path, PathBuf};
//!
//! let log = OperationLog::open(Path::new("undo.jsonl")).unwrap();
//! let engine = MutationEngine::new(MutationConfig::default(), log);
//! let plan = vec![PlannedMutation::relocate(
//!     PathBuf::from("/data/b.txt"),
//!     PathBuf::from("/quarantine/b.txt"),
//! )];
//! let report = engine.execute(&plan).unwrap();
//! println!("{}", report.summary());
//! ```

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fsops::{self, aside_path, ensure_parent, move_file};
use super::oplog::{MutationKind, MutationRecord, OpLogError, OperationLog, RecordState};
use crate::progress::ProgressCallback;
use crate::scanner::{hash_to_hex, mtime_secs, FileRecord, Hasher};

/// Size and modification time observed when a mutation was planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileSnapshot {
    /// File size in bytes
    pub size: u64,
    /// Modification time, seconds since the epoch
    pub modified: f64,
}

impl FileSnapshot {
    /// Snapshot of a scanned record.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            size: record.size,
            modified: record.modified,
        }
    }

    /// Snapshot of a file's current state.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, MutationError> {
        let metadata = fs::metadata(path).map_err(|e| MutationError::from_io(path, e))?;
        Self::from_metadata(path, &metadata)
    }

    fn from_metadata(path: &Path, metadata: &fs::Metadata) -> Result<Self, MutationError> {
        let modified = metadata
            .modified()
            .map_err(|e| MutationError::from_io(path, e))?;
        Ok(Self {
            size: metadata.len(),
            modified: mtime_secs(modified),
        })
    }

    fn matches(&self, other: &Self) -> bool {
        self.size == other.size && (self.modified - other.modified).abs() < 1e-6
    }
}

/// One unit of work for the engine.
///
/// For [`MutationKind::Move`] the file at `target` goes to `destination`.
/// For [`MutationKind::Hardlink`] and [`MutationKind::Copy`] the content of
/// `target` is replaced by that of `destination` (the keeper).
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMutation {
    /// Kind of mutation requested
    pub kind: MutationKind,
    /// File being moved or replaced
    pub target: PathBuf,
    /// Move destination, or keeper for hardlink/copy
    pub destination: PathBuf,
    /// State of `target` at planning time
    pub expected: Option<FileSnapshot>,
}

impl PlannedMutation {
    /// Move `target` to `destination`.
    #[must_use]
    pub fn relocate(target: PathBuf, destination: PathBuf) -> Self {
        Self {
            kind: MutationKind::Move,
            target,
            destination,
            expected: None,
        }
    }

    /// Replace `target` with a hard link to `keeper`.
    #[must_use]
    pub fn link(target: PathBuf, keeper: PathBuf) -> Self {
        Self {
            kind: MutationKind::Hardlink,
            target,
            destination: keeper,
            expected: None,
        }
    }

    /// Replace `target` with a copy of `keeper`.
    #[must_use]
    pub fn copy(target: PathBuf, keeper: PathBuf) -> Self {
        Self {
            kind: MutationKind::Copy,
            target,
            destination: keeper,
            expected: None,
        }
    }

    /// Skip the item if `target` no longer matches `snapshot`.
    #[must_use]
    pub fn with_expected(mut self, snapshot: FileSnapshot) -> Self {
        self.expected = Some(snapshot);
        self
    }
}

impl fmt::Display for PlannedMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MutationKind::Move => write!(
                f,
                "move {} -> {}",
                self.target.display(),
                self.destination.display()
            ),
            kind => write!(
                f,
                "{} {} <- {}",
                kind,
                self.target.display(),
                self.destination.display()
            ),
        }
    }
}

/// What to do when a move destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Fail that mutation
    #[default]
    Fail,
    /// Append `-<first 10 hex chars of the content hash>` to the file stem
    Rename,
}

/// What to do when a hard link cannot be made across devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardlinkFallback {
    /// Fail that mutation as unsupported
    #[default]
    Skip,
    /// Replace with a copy instead (logged as `copy`)
    Copy,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct MutationConfig {
    /// Report what would happen without touching anything
    pub dry_run: bool,
    /// Move destination conflicts
    pub conflict: ConflictPolicy,
    /// Cross-device hard links
    pub hardlink_fallback: HardlinkFallback,
    /// Skip targets whose size or mtime changed since planning
    pub verify_unchanged: bool,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            conflict: ConflictPolicy::Fail,
            hardlink_fallback: HardlinkFallback::Skip,
            verify_unchanged: true,
        }
    }
}

impl MutationConfig {
    /// Enable/disable dry-run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the conflict policy.
    #[must_use]
    pub fn with_conflict(mut self, conflict: ConflictPolicy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Set the hardlink fallback.
    #[must_use]
    pub fn with_hardlink_fallback(mut self, fallback: HardlinkFallback) -> Self {
        self.hardlink_fallback = fallback;
        self
    }

    /// Enable/disable the modified-since-planning check.
    #[must_use]
    pub fn with_verify_unchanged(mut self, verify: bool) -> Self {
        self.verify_unchanged = verify;
        self
    }
}

/// Error type for a single mutation.
#[derive(Debug, Error)]
pub enum MutationError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when reading or replacing the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File was modified since scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// Target is a directory or special file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The keeper whose content was to be used is gone.
    #[error("keeper missing: {0}")]
    KeeperMissing(PathBuf),

    /// Target already shares its inode with the keeper.
    #[error("already linked to keeper: {0}")]
    AlreadyLinked(PathBuf),

    /// Move destination already exists.
    #[error("destination exists: {0}")]
    Conflict(PathBuf),

    /// The operation is not possible here (e.g. hard link across devices).
    #[error("unsupported operation for {path}: {reason}")]
    Unsupported {
        /// Target path
        path: PathBuf,
        /// Why it is unsupported
        reason: String,
    },

    /// General I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl MutationError {
    /// Classify an I/O error on `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// True for inaccessible or unchanged-needed items, which are skipped
    /// rather than counted as failures.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::PermissionDenied(_)
                | Self::Modified(_)
                | Self::NotAFile(_)
                | Self::KeeperMissing(_)
                | Self::AlreadyLinked(_)
        )
    }
}

/// Result of one item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Completed (or planned, in dry-run)
    Success(PlannedMutation),
    /// Left alone
    Skipped {
        /// Target path
        path: PathBuf,
        /// Reason
        reason: String,
    },
    /// Attempted and failed
    Failed {
        /// Target path
        path: PathBuf,
        /// Reason
        reason: String,
    },
}

/// Results of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Records written to the operation log, in order
    pub records: Vec<MutationRecord>,
    /// Items left alone, with reasons
    pub skipped: Vec<(PathBuf, String)>,
    /// Items that failed, with reasons
    pub failed: Vec<(PathBuf, String)>,
    /// Mutations that passed pre-flight (all of them in dry-run)
    pub planned: Vec<PlannedMutation>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl BatchReport {
    /// Completed (or, in dry-run, planned) mutations.
    #[must_use]
    pub fn success_count(&self) -> usize {
        if self.dry_run {
            self.planned.len()
        } else {
            self.records.len()
        }
    }

    /// Number of skipped items.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    /// Total number of items handled.
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.success_count() + self.skipped_count() + self.failure_count()
    }

    /// Check if nothing was skipped or failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Human-readable summary of the operation.
    #[must_use]
    pub fn summary(&self) -> String {
        let verb = if self.dry_run {
            "Dry run: would apply"
        } else {
            "Applied"
        };
        format!(
            "{} {} mutation(s), {} skipped, {} failed",
            verb,
            self.success_count(),
            self.skipped_count(),
            self.failure_count()
        )
    }

    fn push(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success(planned) => self.planned.push(planned),
            ItemOutcome::Skipped { path, reason } => self.skipped.push((path, reason)),
            ItemOutcome::Failed { path, reason } => self.failed.push((path, reason)),
        }
    }
}

/// A batch that had to stop.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The log could not be written. The item in hand was either never
    /// attempted or rolled back, and nothing after it was attempted.
    #[error("batch aborted, operation log unwritable: {source}")]
    LogWrite {
        /// Log error
        #[source]
        source: OpLogError,
        /// What had been done (and logged) before the failure
        report: Box<BatchReport>,
    },
}

impl BatchError {
    /// Work completed before the batch stopped.
    #[must_use]
    pub fn report(&self) -> &BatchReport {
        match self {
            Self::LogWrite { report, .. } => report,
        }
    }
}

/// A mutation that passed pre-flight, with its final destination and kind.
struct Prepared {
    kind: MutationKind,
    target: PathBuf,
    destination: PathBuf,
    /// Where a replaced original is parked (hardlink/copy only)
    aside: Option<PathBuf>,
}

impl Prepared {
    /// The write-ahead record for this item.
    fn intent(&self) -> MutationRecord {
        MutationRecord::pending(
            self.kind,
            self.target.clone(),
            self.destination.clone(),
            self.aside.clone(),
        )
    }
}

/// How to undo an applied mutation that could not be logged.
enum Rollback {
    Move { from: PathBuf, to: PathBuf },
    Replace { target: PathBuf, aside: PathBuf },
}

impl Rollback {
    fn undo(self) -> io::Result<()> {
        match self {
            Self::Move { from, to } => move_file(&from, &to),
            Self::Replace { target, aside } => {
                fs::remove_file(&target)?;
                fs::rename(&aside, &target)
            }
        }
    }

    /// The mutation is logged: drop what was kept for rollback.
    fn commit(self) {
        if let Self::Replace { aside, .. } = self {
            if let Err(e) = fs::remove_file(&aside) {
                log::warn!("Failed to remove {}: {}", aside.display(), e);
            }
        }
    }
}

/// Executes planned mutations and records them.
pub struct MutationEngine {
    config: MutationConfig,
    log: Option<OperationLog>,
    hasher: Hasher,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl MutationEngine {
    /// Engine that appends every completed mutation to `log`.
    #[must_use]
    pub fn new(config: MutationConfig, log: OperationLog) -> Self {
        Self {
            config,
            log: Some(log),
            hasher: Hasher::new(),
            progress: None,
        }
    }

    /// Engine that only reports; dry-run is forced on and no log is opened.
    #[must_use]
    pub fn preview(config: MutationConfig) -> Self {
        Self {
            config: config.with_dry_run(true),
            log: None,
            hasher: Hasher::new(),
            progress: None,
        }
    }

    /// Open `log_path` unless `config` is a dry run.
    ///
    /// # Errors
    ///
    /// Returns [`OpLogError::Open`] when the log cannot be opened, before any
    /// mutation is attempted.
    pub fn open(config: MutationConfig, log_path: &Path) -> Result<Self, OpLogError> {
        if config.dry_run {
            Ok(Self::preview(config))
        } else {
            Ok(Self::new(config, OperationLog::open(log_path)?))
        }
    }

    /// Report per-item progress.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Whether this engine only reports.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.config.dry_run || self.log.is_none()
    }

    /// Run every item of `plan` in order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::LogWrite`] if a record cannot be appended. An
    /// item whose pending record fails is never attempted; one whose
    /// completion record fails is rolled back. The rest of the plan is not
    /// attempted. Per-item problems never produce an error.
    pub fn execute(&self, plan: &[PlannedMutation]) -> Result<BatchReport, BatchError> {
        let mut report = BatchReport {
            dry_run: self.is_dry_run(),
            ..BatchReport::default()
        };

        if let Some(progress) = &self.progress {
            progress.on_phase_start("mutating", plan.len());
        }

        for (index, item) in plan.iter().enumerate() {
            if let Some(progress) = &self.progress {
                progress.on_progress(index + 1, &item.target.to_string_lossy());
            }

            let prepared = match self.prepare(item) {
                Ok(prepared) => prepared,
                Err(e) => {
                    report.push(outcome_for(&item.target, &e));
                    continue;
                }
            };

            if report.dry_run {
                log::info!("[dry-run] {}", item);
                report.push(ItemOutcome::Success(item.clone()));
                continue;
            }

            let intent = prepared.intent();
            if let Err(source) = self.append(&intent) {
                log::error!(
                    "Cannot log {} {}: {}; stopping before it is attempted",
                    intent.action,
                    intent.src.display(),
                    source
                );
                return Err(BatchError::LogWrite {
                    source,
                    report: Box::new(report),
                });
            }

            let (record, rollback) = match self.apply(&prepared) {
                Ok(applied) => applied,
                Err(e) => {
                    report.push(outcome_for(&item.target, &e));
                    if let Err(source) = self.append(&intent.with_state(RecordState::Aborted)) {
                        log::error!("Cannot log the failed {}: {}; stopping", item, source);
                        return Err(BatchError::LogWrite {
                            source,
                            report: Box::new(report),
                        });
                    }
                    continue;
                }
            };

            if let Err(source) = self.append(&record) {
                log::error!(
                    "Cannot log {} {}: {}; rolling back and stopping",
                    record.action,
                    record.src.display(),
                    source
                );
                if let Err(e) = rollback.undo() {
                    log::error!(
                        "Rollback of {} failed: {}",
                        record.src.display(),
                        e
                    );
                }
                return Err(BatchError::LogWrite {
                    source,
                    report: Box::new(report),
                });
            }
            rollback.commit();

            log::debug!(
                "{} {} -> {}",
                record.action,
                record.src.display(),
                record.dst.display()
            );
            report.push(ItemOutcome::Success(item.clone()));
            report.records.push(record);
        }

        if let Some(progress) = &self.progress {
            progress.on_phase_end("mutating");
        }
        log::info!("{}", report.summary());
        Ok(report)
    }

    fn append(&self, record: &MutationRecord) -> Result<(), OpLogError> {
        match &self.log {
            Some(log) => log.append(record),
            None => Ok(()),
        }
    }

    /// Read-only checks; resolves the final destination and kind.
    fn prepare(&self, item: &PlannedMutation) -> Result<Prepared, MutationError> {
        let target = &item.target;
        let metadata = fs::metadata(target).map_err(|e| MutationError::from_io(target, e))?;
        if !metadata.is_file() {
            return Err(MutationError::NotAFile(target.clone()));
        }

        if self.config.verify_unchanged {
            if let Some(expected) = &item.expected {
                let current = FileSnapshot::from_metadata(target, &metadata)?;
                if !expected.matches(&current) {
                    return Err(MutationError::Modified(target.clone()));
                }
            }
        }

        match item.kind {
            MutationKind::Move => {
                let destination = self.resolve_destination(target, &item.destination)?;
                Ok(Prepared {
                    kind: MutationKind::Move,
                    target: target.clone(),
                    destination,
                    aside: None,
                })
            }
            MutationKind::Hardlink | MutationKind::Copy => {
                let keeper = &item.destination;
                if keeper == target {
                    return Err(MutationError::AlreadyLinked(target.clone()));
                }
                let keeper_meta = fs::metadata(keeper).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => MutationError::KeeperMissing(keeper.clone()),
                    _ => MutationError::from_io(keeper, e),
                })?;

                let mut kind = item.kind;
                if kind == MutationKind::Hardlink {
                    if fsops::same_file(&metadata, &keeper_meta) {
                        return Err(MutationError::AlreadyLinked(target.clone()));
                    }
                    if !fsops::same_device(&metadata, &keeper_meta) {
                        kind = self.cross_device_fallback(target)?;
                    }
                }
                Ok(Prepared {
                    kind,
                    target: target.clone(),
                    destination: keeper.clone(),
                    aside: Some(aside_path(target)),
                })
            }
        }
    }

    fn cross_device_fallback(&self, target: &Path) -> Result<MutationKind, MutationError> {
        match self.config.hardlink_fallback {
            HardlinkFallback::Skip => Err(MutationError::Unsupported {
                path: target.to_path_buf(),
                reason: "hard link across filesystems".to_string(),
            }),
            HardlinkFallback::Copy => {
                log::warn!(
                    "{} is on another filesystem than its keeper; copying instead of linking",
                    target.display()
                );
                Ok(MutationKind::Copy)
            }
        }
    }

    fn resolve_destination(&self, target: &Path, wanted: &Path) -> Result<PathBuf, MutationError> {
        if fs::symlink_metadata(wanted).is_err() {
            return Ok(wanted.to_path_buf());
        }
        match self.config.conflict {
            ConflictPolicy::Fail => Err(MutationError::Conflict(wanted.to_path_buf())),
            ConflictPolicy::Rename => {
                let renamed = self.hash_suffixed(target, wanted)?;
                if fs::symlink_metadata(&renamed).is_ok() {
                    return Err(MutationError::Conflict(renamed));
                }
                log::debug!(
                    "{} exists, using {}",
                    wanted.display(),
                    renamed.display()
                );
                Ok(renamed)
            }
        }
    }

    /// `dir/stem-<hash10>.ext` for the content of `target`.
    fn hash_suffixed(&self, target: &Path, wanted: &Path) -> Result<PathBuf, MutationError> {
        let hash = self.hasher.full_hash(target).map_err(|e| match e {
            crate::scanner::HashError::NotFound(p) => MutationError::NotFound(p),
            crate::scanner::HashError::PermissionDenied(p) => MutationError::PermissionDenied(p),
            crate::scanner::HashError::Io { path, source } => MutationError::Io { path, source },
        })?;
        let hex = hash_to_hex(&hash);
        let stem = wanted
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match wanted.extension() {
            Some(ext) => format!("{}-{}.{}", stem, &hex[..10], ext.to_string_lossy()),
            None => format!("{}-{}", stem, &hex[..10]),
        };
        Ok(wanted.with_file_name(name))
    }

    fn apply(&self, prepared: &Prepared) -> Result<(MutationRecord, Rollback), MutationError> {
        let Prepared {
            kind,
            target,
            destination,
            aside,
        } = prepared;
        let parked = || aside.clone().unwrap_or_else(|| aside_path(target));

        match kind {
            MutationKind::Move => {
                ensure_parent(destination).map_err(|e| MutationError::from_io(destination, e))?;
                move_file(target, destination).map_err(|e| {
                    if e.kind() == io::ErrorKind::AlreadyExists {
                        MutationError::Conflict(destination.clone())
                    } else {
                        MutationError::from_io(target, e)
                    }
                })?;
                Ok((
                    MutationRecord::now(MutationKind::Move, target.clone(), destination.clone()),
                    Rollback::Move {
                        from: destination.clone(),
                        to: target.clone(),
                    },
                ))
            }
            MutationKind::Hardlink => {
                let aside = replace_with(target, parked(), |t| fs::hard_link(destination, t)).map_err(
                    |e| {
                        if fsops::is_cross_device_error(&e) {
                            MutationError::Unsupported {
                                path: target.clone(),
                                reason: "hard link across filesystems".to_string(),
                            }
                        } else {
                            MutationError::from_io(target, e)
                        }
                    },
                )?;
                Ok((
                    MutationRecord::now(MutationKind::Hardlink, target.clone(), destination.clone()),
                    Rollback::Replace {
                        target: target.clone(),
                        aside,
                    },
                ))
            }
            MutationKind::Copy => {
                let aside = replace_with(target, parked(), |t| fs::copy(destination, t).map(drop))
                    .map_err(|e| MutationError::from_io(target, e))?;
                Ok((
                    MutationRecord::now(MutationKind::Copy, target.clone(), destination.clone()),
                    Rollback::Replace {
                        target: target.clone(),
                        aside,
                    },
                ))
            }
        }
    }
}

/// Move `target` to `aside`, run `create` to put new content at `target`,
/// and restore the original if that fails. Returns `aside` on success.
fn replace_with<F>(target: &Path, aside: PathBuf, create: F) -> io::Result<PathBuf>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    fs::rename(target, &aside)?;
    if let Err(e) = create(target) {
        let _ = fs::remove_file(target);
        if let Err(restore) = fs::rename(&aside, target) {
            log::error!(
                "Could not restore {} from {}: {}",
                target.display(),
                aside.display(),
                restore
            );
        }
        return Err(e);
    }
    Ok(aside)
}

fn outcome_for(path: &Path, error: &MutationError) -> ItemOutcome {
    let reason = error.to_string();
    if error.is_skip() {
        log::warn!("Skipping {}: {}", path.display(), reason);
        ItemOutcome::Skipped {
            path: path.to_path_buf(),
            reason,
        }
    } else {
        log::warn!("Failed {}: {}", path.display(), reason);
        ItemOutcome::Failed {
            path: path.to_path_buf(),
            reason,
        }
    }
}
