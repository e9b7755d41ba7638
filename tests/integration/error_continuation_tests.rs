use drivetidy::actions::{MutationConfig, MutationEngine, MutationError, PlannedMutation};
use drivetidy::scanner::{FileRecord, ScanOptions, Scanner};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_file_vanishing_mid_scan_is_skipped() {
    let dir = TempDir::new().unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(dir.path().join(name), name).unwrap();
    }

    let mut scan = Scanner::new(ScanOptions::default()).scan(dir.path()).unwrap();
    let first = scan.next().unwrap();
    assert!(first.path.ends_with("a.txt"));

    fs::remove_file(dir.path().join("b.txt")).unwrap();
    let rest: Vec<FileRecord> = scan.by_ref().collect();

    assert_eq!(rest.len(), 1);
    assert!(rest[0].path.ends_with("c.txt"));
    let stats = scan.into_stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.skipped.len(), 1);
    assert!(stats.skipped[0].path.ends_with("b.txt"));
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let locked = dir.path().join("locked.txt");
    fs::write(dir.path().join("open.txt"), "open").unwrap();
    fs::write(&locked, "secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Privileged users can read anything; nothing to test then.
    if fs::read(&locked).is_ok() {
        return;
    }

    let mut scan = Scanner::new(ScanOptions::default()).scan(dir.path()).unwrap();
    let records: Vec<FileRecord> = scan.by_ref().collect();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(scan.stats().skipped.len(), 1);
}

#[test]
fn test_batch_continues_past_bad_items() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.txt");
    let taken = dir.path().join("taken.txt");
    fs::write(&good, "g").unwrap();
    fs::write(&taken, "t").unwrap();
    fs::write(dir.path().join("occupied.txt"), "o").unwrap();

    let plan = vec![
        PlannedMutation::relocate(dir.path().join("missing.txt"), dir.path().join("q/missing.txt")),
        PlannedMutation::relocate(taken.clone(), dir.path().join("occupied.txt")),
        PlannedMutation::relocate(good.clone(), dir.path().join("q/good.txt")),
    ];
    let report = MutationEngine::open(MutationConfig::default(), &dir.path().join("undo.jsonl"))
        .unwrap()
        .execute(&plan)
        .unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.failure_count(), 1);
    assert_eq!(report.total_count(), 3);
    assert!(dir.path().join("q/good.txt").exists());
    assert!(taken.exists());
    assert!(report.summary().contains("1 skipped, 1 failed"));
}

#[test]
fn test_mutation_error_classification() {
    let dir = TempDir::new().unwrap();
    let err = MutationError::from_io(
        &dir.path().join("x"),
        std::io::Error::from(std::io::ErrorKind::NotFound),
    );
    assert!(err.is_skip());
    assert!(!MutationError::Conflict(dir.path().join("x")).is_skip());
}
