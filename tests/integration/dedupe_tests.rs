use drivetidy::actions::{
    plan_dedupe, read_log, undo_log, DedupeOptions, MutationConfig, MutationEngine, MutationKind,
    PlanError, UndoOptions,
};
use drivetidy::duplicates::{group_by_fingerprint, KeeperPolicy};
use drivetidy::scanner::{FileRecord, Namespace, ScanOptions, Scanner};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// `data/{a,b,c}.txt` share content, `data/d.txt` is unique.
fn fixture() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    for name in ["c.txt", "a.txt", "b.txt"] {
        fs::write(data.join(name), "duplicate body").unwrap();
    }
    fs::write(data.join("d.txt"), "unique").unwrap();
    (dir, data)
}

fn scan(root: &Path) -> Vec<FileRecord> {
    Scanner::new(ScanOptions::default()).scan(root).unwrap().collect()
}

#[test]
fn test_quarantine_then_undo() {
    let (dir, data) = fixture();
    let quarantine = dir.path().join("quarantine");
    let log_path = dir.path().join("logs").join("undo.jsonl");

    let records = scan(&data);
    let (groups, stats) = group_by_fingerprint(&records, Namespace::Exact);
    assert_eq!(groups.len(), 1);
    assert_eq!(stats.duplicate_files, 3);

    let options = DedupeOptions {
        policy: KeeperPolicy::Alphabetical,
        quarantine: Some(quarantine.clone()),
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();
    assert_eq!(plan.keepers, vec![data.join("a.txt")]);

    let engine = MutationEngine::open(MutationConfig::default(), &log_path).unwrap();
    let report = engine.execute(&plan.mutations).unwrap();
    assert_eq!(report.success_count(), 2);
    assert!(report.all_succeeded());

    assert!(data.join("a.txt").exists());
    assert!(!data.join("b.txt").exists());
    assert!(!data.join("c.txt").exists());
    assert!(quarantine.join("b.txt").exists());
    assert!(quarantine.join("c.txt").exists());

    let log = read_log(&log_path).unwrap();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|r| r.action == MutationKind::Move));
    assert_eq!(log[0].src, data.join("b.txt"));
    assert_eq!(log[0].dst, quarantine.join("b.txt"));

    let undo = undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_eq!(undo.restored.len(), 2);
    for name in ["a.txt", "b.txt", "c.txt"] {
        assert_eq!(fs::read_to_string(data.join(name)).unwrap(), "duplicate body");
    }
    assert!(!quarantine.join("b.txt").exists());
}

#[test]
fn test_dry_run_changes_nothing_and_writes_no_log() {
    let (dir, data) = fixture();
    let log_path = dir.path().join("undo.jsonl");
    let (groups, _) = group_by_fingerprint(&scan(&data), Namespace::Exact);
    let options = DedupeOptions {
        quarantine: Some(dir.path().join("quarantine")),
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();

    let engine = MutationEngine::open(MutationConfig::default().with_dry_run(true), &log_path).unwrap();
    let report = engine.execute(&plan.mutations).unwrap();

    assert!(report.dry_run);
    assert_eq!(report.planned.len(), 2);
    assert!(report.records.is_empty());
    assert!(!log_path.exists());
    assert!(!dir.path().join("quarantine").exists());
    assert!(data.join("b.txt").exists());
}

#[test]
fn test_file_modified_after_scan_is_skipped() {
    let (dir, data) = fixture();
    let (groups, _) = group_by_fingerprint(&scan(&data), Namespace::Exact);
    let options = DedupeOptions {
        quarantine: Some(dir.path().join("quarantine")),
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();

    fs::write(data.join("b.txt"), "edited after the scan, longer now").unwrap();

    let engine = MutationEngine::open(MutationConfig::default(), &dir.path().join("undo.jsonl")).unwrap();
    let report = engine.execute(&plan.mutations).unwrap();

    assert_eq!(report.success_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    assert_eq!(report.skipped[0].0, data.join("b.txt"));
    assert!(data.join("b.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_hardlink_mode_and_undo() {
    use std::os::unix::fs::MetadataExt;

    let (dir, data) = fixture();
    let log_path = dir.path().join("undo.jsonl");
    let (groups, _) = group_by_fingerprint(&scan(&data), Namespace::Exact);
    let options = DedupeOptions {
        link_mode: MutationKind::Hardlink,
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();

    let engine = MutationEngine::open(MutationConfig::default(), &log_path).unwrap();
    let report = engine.execute(&plan.mutations).unwrap();
    assert_eq!(report.success_count(), 2);

    let keeper_ino = fs::metadata(data.join("a.txt")).unwrap().ino();
    assert_eq!(fs::metadata(data.join("b.txt")).unwrap().ino(), keeper_ino);
    assert_eq!(fs::metadata(data.join("a.txt")).unwrap().nlink(), 3);
    assert!(fs::read_dir(&data)
        .unwrap()
        .all(|e| !e.unwrap().file_name().to_string_lossy().ends_with(".to_delete")));

    // Running the same plan again finds everything already linked.
    let again = MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan.mutations)
        .unwrap();
    assert_eq!(again.skipped_count(), 2);

    undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_ne!(fs::metadata(data.join("b.txt")).unwrap().ino(), keeper_ino);
    assert_eq!(fs::read_to_string(data.join("b.txt")).unwrap(), "duplicate body");
    assert_eq!(fs::metadata(data.join("a.txt")).unwrap().nlink(), 1);
}

#[test]
fn test_copy_mode_keeps_independent_files() {
    let (dir, data) = fixture();
    let log_path = dir.path().join("undo.jsonl");
    let (groups, _) = group_by_fingerprint(&scan(&data), Namespace::Exact);
    let options = DedupeOptions {
        link_mode: MutationKind::Copy,
        policy: KeeperPolicy::ShortestPath,
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();
    let report = MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan.mutations)
        .unwrap();

    assert_eq!(report.success_count(), 2);
    let log = read_log(&log_path).unwrap();
    assert!(log.iter().all(|r| r.action == MutationKind::Copy && r.dst == data.join("a.txt")));
}

/// Two images that only look alike: same perceptual hash, different bytes.
fn similar_images() -> (TempDir, PathBuf, Vec<FileRecord>) {
    let dir = TempDir::new().unwrap();
    let photos = dir.path().join("photos");
    fs::create_dir_all(&photos).unwrap();
    fs::write(photos.join("a.png"), "AAAA-keeper").unwrap();
    fs::write(photos.join("b.png"), "BBBB-original").unwrap();
    let records = scan(&photos)
        .into_iter()
        .map(|r| r.with_fingerprint(Namespace::Perceptual, "f0e1d2c3b4a59687"))
        .collect();
    (dir, photos, records)
}

#[test]
fn test_copy_mode_refuses_similar_group() {
    let (dir, photos, records) = similar_images();
    let (groups, _) = group_by_fingerprint(&records, Namespace::Perceptual);
    assert_eq!(groups.len(), 1);

    for link_mode in [MutationKind::Copy, MutationKind::Hardlink] {
        let options = DedupeOptions {
            namespace: Namespace::Perceptual,
            link_mode,
            ..DedupeOptions::default()
        };
        let err = plan_dedupe(&groups, &options).unwrap_err();
        assert_eq!(
            err,
            PlanError::LossyLinkMode {
                namespace: Namespace::Perceptual,
                link_mode,
            }
        );
    }

    assert_eq!(fs::read_to_string(photos.join("b.png")).unwrap(), "BBBB-original");
    assert!(!dir.path().join("undo.jsonl").exists());
}

#[test]
fn test_similar_group_quarantine_undo_keeps_original_bytes() {
    let (dir, photos, records) = similar_images();
    let log_path = dir.path().join("undo.jsonl");
    let (groups, _) = group_by_fingerprint(&records, Namespace::Perceptual);
    let options = DedupeOptions {
        namespace: Namespace::Perceptual,
        quarantine: Some(dir.path().join("quarantine")),
        ..DedupeOptions::default()
    };
    let plan = plan_dedupe(&groups, &options).unwrap();
    assert_eq!(plan.keepers, vec![photos.join("a.png")]);

    let report = MutationEngine::open(MutationConfig::default(), &log_path)
        .unwrap()
        .execute(&plan.mutations)
        .unwrap();
    assert_eq!(report.success_count(), 1);
    assert!(!photos.join("b.png").exists());

    let undo = undo_log(&log_path, &UndoOptions::default()).unwrap();
    assert_eq!(undo.restored.len(), 1);
    assert_eq!(fs::read_to_string(photos.join("b.png")).unwrap(), "BBBB-original");
    assert_eq!(fs::read_to_string(photos.join("a.png")).unwrap(), "AAAA-keeper");
}
