use drivetidy::actions::{
    read_log, undo_log, MutationConfig, MutationEngine, MutationKind, MutationRecord, OpLogError,
    OperationLog, PlannedMutation, UndoAction, UndoOptions,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn quarantine_all(dir: &Path, names: &[&str]) -> std::path::PathBuf {
    let log_path = dir.join("undo.jsonl");
    let plan: Vec<PlannedMutation> = names
        .iter()
        .map(|name| {
            fs::write(dir.join(name), name.as_bytes()).unwrap();
            PlannedMutation::relocate(dir.join(name), dir.join("q").join(name))
        })
        .collect();
    MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan)
        .unwrap();
    log_path
}

#[test]
fn test_undo_is_best_effort() {
    let dir = TempDir::new().unwrap();
    let log_path = quarantine_all(dir.path(), &["a.txt", "b.txt", "c.txt"]);

    fs::remove_file(dir.path().join("q").join("b.txt")).unwrap();
    fs::write(dir.path().join("c.txt"), "recreated").unwrap();

    let report = undo_log(&log_path, &UndoOptions::default()).unwrap();

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a.txt");
    assert_eq!(fs::read_to_string(dir.path().join("c.txt")).unwrap(), "recreated");
    assert!(dir.path().join("q").join("c.txt").exists());
}

#[test]
fn test_undo_restores_missing_files_from_backup() {
    let dir = TempDir::new().unwrap();
    let log_path = quarantine_all(dir.path(), &["a.txt"]);
    fs::remove_dir_all(dir.path().join("q")).unwrap();

    let backups = dir.path().join("backup");
    fs::create_dir_all(&backups).unwrap();
    fs::write(backups.join("a.txt"), "from backup").unwrap();

    let options = UndoOptions {
        dry_run: false,
        backup_dir: Some(backups.clone()),
    };
    let report = undo_log(&log_path, &options).unwrap();

    assert_eq!(
        report.restored,
        vec![UndoAction::RestoreBackup {
            backup: backups.join("a.txt"),
            to: dir.path().join("a.txt"),
        }]
    );
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "from backup");
}

#[test]
fn test_undo_dry_run_leaves_everything() {
    let dir = TempDir::new().unwrap();
    let log_path = quarantine_all(dir.path(), &["a.txt", "b.txt"]);
    let before = fs::read_to_string(&log_path).unwrap();

    let options = UndoOptions {
        dry_run: true,
        backup_dir: None,
    };
    let report = undo_log(&log_path, &options).unwrap();

    assert_eq!(report.planned.len(), 2);
    assert_eq!(report.planned[0].restored_path(), dir.path().join("b.txt"));
    assert!(!dir.path().join("a.txt").exists());
    assert_eq!(fs::read_to_string(&log_path).unwrap(), before);
}

#[test]
fn test_undo_tolerates_torn_last_line() {
    let dir = TempDir::new().unwrap();
    let log_path = quarantine_all(dir.path(), &["a.txt"]);
    let mut text = fs::read_to_string(&log_path).unwrap();
    text.push_str("{\"action\":\"move\",\"src\":");
    fs::write(&log_path, text).unwrap();

    assert_eq!(read_log(&log_path).unwrap().len(), 1);
    let report = undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_eq!(report.restored.len(), 1);
}

#[test]
fn test_unreadable_log_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = undo_log(&dir.path().join("nope.jsonl"), &UndoOptions::default());
    assert!(matches!(result, Err(OpLogError::Read(_))));
}

#[test]
fn test_undo_after_crash_mid_batch() {
    let dir = TempDir::new().unwrap();
    let log_path = quarantine_all(dir.path(), &["a.txt"]);

    // The run was killed after b.txt moved but before its outcome was logged,
    // and before c.txt was touched.
    let (b, c) = (dir.path().join("b.txt"), dir.path().join("c.txt"));
    let (qb, qc) = (dir.path().join("q").join("b.txt"), dir.path().join("q").join("c.txt"));
    fs::write(&qb, "b").unwrap();
    fs::write(&c, "c").unwrap();
    let log = OperationLog::open(&log_path).unwrap();
    log.append(&MutationRecord::pending(MutationKind::Move, b.clone(), qb.clone(), None))
        .unwrap();
    log.append(&MutationRecord::pending(MutationKind::Move, c.clone(), qc.clone(), None))
        .unwrap();

    let records = read_log(&log_path).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records.iter().filter(|r| r.is_pending()).count(), 2);

    let report = undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_eq!(report.restored.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(fs::read_to_string(&b).unwrap(), "b");
    assert_eq!(fs::read_to_string(&c).unwrap(), "c");
    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "a.txt");
    assert!(!qb.exists());
}
