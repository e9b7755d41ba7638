//! Reversing an operation log.
//!
//! Records are replayed newest first, so a file moved twice comes back
//! through each intermediate location in turn. Undo is best-effort: a
//! record that cannot be reversed is warned about and skipped, and the
//! rest of the log is still processed.
//!
//! - `move`: the file at `dst` goes back to `src`. If `dst` is gone, a copy
//!   named after `src` in the backup directory is used instead. An occupied
//!   `src` is never overwritten.
//! - `hardlink` / `copy`: the keeper at `dst` stays where it is. The file at
//!   `src` becomes an independent copy again, from the backup directory when
//!   it holds one, otherwise from the keeper's bytes.
//!
//! A record left `pending` by an interrupted run is judged from the disk: a
//! move whose source is still there never happened, and a hardlink/copy
//! whose parked original still exists gets that original back.
//!
//! A dry run tracks the steps it would take, so a chain of moves is
//! reported the same way a real run would carry it out.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::fsops::{ensure_parent, move_file};
use super::oplog::{read_log, MutationKind, MutationRecord, OpLogError};

/// Options for an undo run.
#[derive(Debug, Clone, Default)]
pub struct UndoOptions {
    /// Report without touching anything
    pub dry_run: bool,
    /// Directory of `<file name>` backups used when a logged file is gone
    pub backup_dir: Option<PathBuf>,
}

/// One reversal step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoAction {
    /// Move `from` back to `to`
    MoveBack {
        /// Current location
        from: PathBuf,
        /// Original location
        to: PathBuf,
    },
    /// Copy a backup to `to`
    RestoreBackup {
        /// Backup file
        backup: PathBuf,
        /// Original location
        to: PathBuf,
    },
    /// Make `to` an independent copy of `from`
    CopyBack {
        /// Keeper
        from: PathBuf,
        /// Replaced file
        to: PathBuf,
    },
    /// Put the original parked by an interrupted hardlink/copy back
    RestoreAside {
        /// Parked original
        aside: PathBuf,
        /// Replaced file
        to: PathBuf,
    },
}

impl UndoAction {
    /// Path being restored.
    #[must_use]
    pub fn restored_path(&self) -> &Path {
        match self {
            Self::MoveBack { to, .. }
            | Self::RestoreBackup { to, .. }
            | Self::CopyBack { to, .. }
            | Self::RestoreAside { to, .. } => to,
        }
    }
}

impl fmt::Display for UndoAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveBack { from, to } => write!(f, "move {} -> {}", from.display(), to.display()),
            Self::RestoreBackup { backup, to } => {
                write!(f, "restore {} from backup {}", to.display(), backup.display())
            }
            Self::CopyBack { from, to } => {
                write!(f, "restore {} as a copy of {}", to.display(), from.display())
            }
            Self::RestoreAside { aside, to } => {
                write!(f, "restore {} from {}", to.display(), aside.display())
            }
        }
    }
}

/// Results of an undo run.
#[derive(Debug, Clone, Default)]
pub struct UndoReport {
    /// Steps carried out
    pub restored: Vec<UndoAction>,
    /// Records that could not be reversed, with reasons
    pub skipped: Vec<(PathBuf, String)>,
    /// Steps that would be carried out (dry-run only)
    pub planned: Vec<UndoAction>,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl UndoReport {
    /// Human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.dry_run {
            format!(
                "Dry run: would restore {} file(s), {} skipped",
                self.planned.len(),
                self.skipped.len()
            )
        } else {
            format!(
                "Restored {} file(s), {} skipped",
                self.restored.len(),
                self.skipped.len()
            )
        }
    }

    fn skip(&mut self, path: &Path, reason: impl Into<String>) {
        let reason = reason.into();
        log::warn!("Cannot undo {}: {}", path.display(), reason);
        self.skipped.push((path.to_path_buf(), reason));
    }
}

/// Read the log at `path` and reverse it.
///
/// # Errors
///
/// Fails only if the log cannot be read; per-record problems are reported
/// in the [`UndoReport`].
pub fn undo_log(path: &Path, options: &UndoOptions) -> Result<UndoReport, OpLogError> {
    let records = read_log(path)?;
    log::info!("Undoing {} record(s) from {}", records.len(), path.display());
    Ok(undo_records(&records, options))
}

/// Reverse `records` (given in log order).
#[must_use]
pub fn undo_records(records: &[MutationRecord], options: &UndoOptions) -> UndoReport {
    let mut report = UndoReport {
        dry_run: options.dry_run,
        ..UndoReport::default()
    };

    let mut view = View::default();
    for record in records.iter().rev() {
        let planned = if record.is_pending() {
            plan_interrupted(record, &view)
        } else {
            plan_reversal(record, options.backup_dir.as_deref(), &view).map(Some)
        };
        let action = match planned {
            Ok(Some(action)) => action,
            Ok(None) => {
                log::info!(
                    "Interrupted {} of {} never took effect",
                    record.action,
                    record.src.display()
                );
                continue;
            }
            Err(reason) => {
                report.skip(&record.src, reason);
                continue;
            }
        };

        if options.dry_run {
            log::info!("[dry-run] {}", action);
            view.simulate(&action);
            report.planned.push(action);
            continue;
        }

        match perform(&action) {
            Ok(()) => {
                log::debug!("Undone: {}", action);
                report.restored.push(action);
            }
            Err(e) => report.skip(&record.src, format!("{action}: {e}")),
        }
    }

    log::info!("{}", report.summary());
    report
}

/// The filesystem as undo sees it, with dry-run steps laid over it.
#[derive(Debug, Default)]
struct View {
    /// Paths made present (`true`) or absent (`false`) by simulated steps
    overlay: HashMap<PathBuf, bool>,
}

impl View {
    fn exists(&self, path: &Path) -> bool {
        self.overlay
            .get(path)
            .copied()
            .unwrap_or_else(|| fs::symlink_metadata(path).is_ok())
    }

    fn is_file(&self, path: &Path) -> bool {
        self.overlay.get(path).copied().unwrap_or_else(|| path.is_file())
    }

    fn simulate(&mut self, action: &UndoAction) {
        match action {
            UndoAction::MoveBack { from, to } | UndoAction::RestoreAside { aside: from, to } => {
                self.overlay.insert(from.clone(), false);
                self.overlay.insert(to.clone(), true);
            }
            UndoAction::RestoreBackup { to, .. } | UndoAction::CopyBack { to, .. } => {
                self.overlay.insert(to.clone(), true);
            }
        }
    }
}

fn backup_for(backup_dir: Option<&Path>, src: &Path) -> Option<PathBuf> {
    let candidate = backup_dir?.join(src.file_name()?);
    candidate.is_file().then_some(candidate)
}

fn plan_reversal(
    record: &MutationRecord,
    backup_dir: Option<&Path>,
    view: &View,
) -> Result<UndoAction, String> {
    let (src, dst) = (&record.src, &record.dst);
    match record.action {
        MutationKind::Move => {
            if view.exists(src) {
                return Err("original path is occupied".to_string());
            }
            if view.exists(dst) {
                return Ok(UndoAction::MoveBack {
                    from: dst.clone(),
                    to: src.clone(),
                });
            }
            backup_for(backup_dir, src)
                .map(|backup| UndoAction::RestoreBackup {
                    backup,
                    to: src.clone(),
                })
                .ok_or_else(|| format!("{} is missing and no backup exists", dst.display()))
        }
        MutationKind::Hardlink | MutationKind::Copy => {
            if let Some(backup) = backup_for(backup_dir, src) {
                return Ok(UndoAction::RestoreBackup {
                    backup,
                    to: src.clone(),
                });
            }
            if view.is_file(dst) {
                return Ok(UndoAction::CopyBack {
                    from: dst.clone(),
                    to: src.clone(),
                });
            }
            Err(format!("keeper {} is missing and no backup exists", dst.display()))
        }
    }
}

/// Reversal of a mutation whose outcome was never logged; `None` when it
/// never took effect.
fn plan_interrupted(record: &MutationRecord, view: &View) -> Result<Option<UndoAction>, String> {
    let (src, dst) = (&record.src, &record.dst);
    match record.action {
        MutationKind::Move => {
            if view.exists(src) {
                return Ok(None);
            }
            if view.exists(dst) {
                return Ok(Some(UndoAction::MoveBack {
                    from: dst.clone(),
                    to: src.clone(),
                }));
            }
            Err(format!(
                "interrupted move: neither {} nor {} exists",
                src.display(),
                dst.display()
            ))
        }
        MutationKind::Hardlink | MutationKind::Copy => Ok(record
            .aside
            .as_ref()
            .filter(|aside| view.exists(aside))
            .map(|aside| UndoAction::RestoreAside {
                aside: aside.clone(),
                to: src.clone(),
            })),
    }
}

fn perform(action: &UndoAction) -> io::Result<()> {
    match action {
        UndoAction::RestoreAside { aside, to } => fs::rename(aside, to),
        UndoAction::MoveBack { from, to } => {
            ensure_parent(to)?;
            move_file(from, to)
        }
        UndoAction::RestoreBackup { backup: from, to } | UndoAction::CopyBack { from, to } => {
            ensure_parent(to)?;
            copy_over(from, to)
        }
    }
}

/// Replace `to` with a copy of `from` without a window where `to` is missing.
fn copy_over(from: &Path, to: &Path) -> io::Result<()> {
    let mut name = to.file_name().map(std::ffi::OsString::from).unwrap_or_default();
    name.push(".undo_tmp");
    let tmp = to.with_file_name(name);

    if let Err(e) = fs::copy(from, &tmp).and_then(|_| fs::rename(&tmp, to)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(action: MutationKind, src: &Path, dst: &Path) -> MutationRecord {
        MutationRecord::now(action, src.to_path_buf(), dst.to_path_buf())
    }

    #[test]
    fn test_undo_move() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("q").join("a.txt");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, "A").unwrap();

        let report = undo_records(&[record(MutationKind::Move, &src, &dst)], &UndoOptions::default());

        assert_eq!(report.restored.len(), 1);
        assert_eq!(fs::read_to_string(&src).unwrap(), "A");
        assert!(!dst.exists());
    }

    #[test]
    fn test_undo_chain_in_reverse() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        fs::write(&c, "data").unwrap();

        let log = vec![
            record(MutationKind::Move, &a, &b),
            record(MutationKind::Move, &b, &c),
        ];
        let report = undo_records(&log, &UndoOptions::default());

        assert_eq!(report.restored.len(), 2);
        assert_eq!(fs::read_to_string(&a).unwrap(), "data");
        assert!(!b.exists());
        assert!(!c.exists());
    }

    #[test]
    fn test_undo_move_does_not_clobber() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        let report = undo_records(&[record(MutationKind::Move, &src, &dst)], &UndoOptions::default());

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(fs::read_to_string(&src).unwrap(), "new");
        assert!(dst.exists());
    }

    #[test]
    fn test_undo_move_from_backup() {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join("backup");
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("a.txt"), "saved").unwrap();
        let src = dir.path().join("a.txt");
        let gone = dir.path().join("q").join("a.txt");

        let missing = undo_records(&[record(MutationKind::Move, &src, &gone)], &UndoOptions::default());
        assert_eq!(missing.skipped.len(), 1);

        let options = UndoOptions {
            backup_dir: Some(backups),
            ..UndoOptions::default()
        };
        let report = undo_records(&[record(MutationKind::Move, &src, &gone)], &options);
        assert_eq!(report.restored.len(), 1);
        assert_eq!(fs::read_to_string(&src).unwrap(), "saved");
    }

    #[cfg(unix)]
    #[test]
    fn test_undo_hardlink_leaves_keeper_and_unlinks() {
        use crate::actions::fsops::same_file;

        let dir = TempDir::new().unwrap();
        let keeper = dir.path().join("keep.txt");
        let target = dir.path().join("dup.txt");
        fs::write(&keeper, "same").unwrap();
        fs::hard_link(&keeper, &target).unwrap();

        let report = undo_records(
            &[record(MutationKind::Hardlink, &target, &keeper)],
            &UndoOptions::default(),
        );

        assert_eq!(report.restored.len(), 1);
        assert!(keeper.exists());
        assert_eq!(fs::read_to_string(&target).unwrap(), "same");
        assert!(!same_file(
            &fs::metadata(&keeper).unwrap(),
            &fs::metadata(&target).unwrap()
        ));
    }

    #[test]
    fn test_undo_copy_prefers_backup() {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join("backup");
        fs::create_dir_all(&backups).unwrap();
        fs::write(backups.join("dup.txt"), "original bytes").unwrap();
        let keeper = dir.path().join("keep.txt");
        let target = dir.path().join("dup.txt");
        fs::write(&keeper, "keeper bytes").unwrap();
        fs::write(&target, "keeper bytes").unwrap();

        let options = UndoOptions {
            backup_dir: Some(backups),
            ..UndoOptions::default()
        };
        undo_records(&[record(MutationKind::Copy, &target, &keeper)], &options);

        assert_eq!(fs::read_to_string(&target).unwrap(), "original bytes");
        assert_eq!(fs::read_to_string(&keeper).unwrap(), "keeper bytes");
    }

    #[test]
    fn test_undo_dry_run() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        fs::write(&dst, "A").unwrap();

        let options = UndoOptions {
            dry_run: true,
            ..UndoOptions::default()
        };
        let report = undo_records(&[record(MutationKind::Move, &src, &dst)], &options);

        assert_eq!(report.planned.len(), 1);
        assert!(report.restored.is_empty());
        assert!(dst.exists());
        assert!(!src.exists());
        assert!(report.summary().starts_with("Dry run"));
    }

    #[test]
    fn test_dry_run_follows_chain_like_real_run() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let c = dir.path().join("c");
        fs::write(&c, "data").unwrap();
        let log = vec![
            record(MutationKind::Move, &a, &b),
            record(MutationKind::Move, &b, &c),
        ];

        let options = UndoOptions {
            dry_run: true,
            ..UndoOptions::default()
        };
        let preview = undo_records(&log, &options);
        assert!(preview.skipped.is_empty());
        assert_eq!(preview.planned.len(), 2);
        assert_eq!(preview.planned[1].restored_path(), a.as_path());
        assert!(c.exists());
        assert!(!a.exists());

        let real = undo_records(&log, &UndoOptions::default());
        assert_eq!(real.restored, preview.planned);
    }

    // ==================== Interrupted Run Tests ====================

    fn interrupted(action: MutationKind, src: &Path, dst: &Path, aside: Option<&Path>) -> MutationRecord {
        MutationRecord::pending(
            action,
            src.to_path_buf(),
            dst.to_path_buf(),
            aside.map(Path::to_path_buf),
        )
    }

    #[test]
    fn test_interrupted_move_that_happened_is_reversed() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("q").join("a.txt");
        fs::create_dir_all(dst.parent().unwrap()).unwrap();
        fs::write(&dst, "A").unwrap();

        let report = undo_records(
            &[interrupted(MutationKind::Move, &src, &dst, None)],
            &UndoOptions::default(),
        );

        assert_eq!(report.restored.len(), 1);
        assert_eq!(fs::read_to_string(&src).unwrap(), "A");
    }

    #[test]
    fn test_interrupted_move_that_never_ran_is_ignored() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "A").unwrap();

        let report = undo_records(
            &[interrupted(MutationKind::Move, &src, &dir.path().join("q.txt"), None)],
            &UndoOptions::default(),
        );

        assert!(report.restored.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(fs::read_to_string(&src).unwrap(), "A");
    }

    #[test]
    fn test_interrupted_copy_restores_parked_original() {
        let dir = TempDir::new().unwrap();
        let keeper = dir.path().join("keep.txt");
        let target = dir.path().join("dup.txt");
        let aside = dir.path().join("dup.txt.to_delete");
        fs::write(&keeper, "keeper").unwrap();
        fs::write(&target, "keeper").unwrap();
        fs::write(&aside, "original").unwrap();

        let report = undo_records(
            &[interrupted(MutationKind::Copy, &target, &keeper, Some(&aside))],
            &UndoOptions::default(),
        );

        assert_eq!(report.restored.len(), 1);
        assert_eq!(fs::read_to_string(&target).unwrap(), "original");
        assert!(!aside.exists());
        assert_eq!(fs::read_to_string(&keeper).unwrap(), "keeper");
    }

    #[test]
    fn test_undo_log_missing_file() {
        let result = undo_log(Path::new("/nonexistent/undo.jsonl"), &UndoOptions::default());
        assert!(matches!(result, Err(OpLogError::Read(_))));
    }
}
