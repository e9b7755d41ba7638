use drivetidy::output::jsonl::{read_json_lines, JsonLinesWriter};
use drivetidy::scanner::{hash_to_hex, FileRecord, Namespace, ScanError, ScanOptions, Scanner};
use std::fs::{self, File};
use std::io::BufWriter;
use tempfile::TempDir;

fn scan_all(root: &std::path::Path, options: ScanOptions) -> Vec<FileRecord> {
    Scanner::new(options).scan(root).unwrap().collect()
}

#[test]
fn test_scan_emits_sorted_absolute_records() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("b.TXT"), "bb").unwrap();
    fs::write(dir.path().join("a.txt"), "a").unwrap();
    fs::write(dir.path().join("sub").join("c"), "").unwrap();

    let records = scan_all(dir.path(), ScanOptions::default());
    let names: Vec<String> = records
        .iter()
        .map(|r| r.path.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["a.txt", "b.TXT", "sub/c"]);
    assert!(records.iter().all(|r| r.path.is_absolute()));
    assert_eq!(records[1].extension, ".txt");
    assert_eq!(records[2].extension, "");
    assert_eq!(
        records[2].fingerprint(Namespace::Exact),
        Some(hash_to_hex(blake3::hash(b"").as_bytes()).as_str())
    );
}

#[test]
fn test_scan_filters() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("node_modules")).unwrap();
    fs::write(dir.path().join("node_modules").join("x.js"), "x").unwrap();
    fs::write(dir.path().join("keep.txt"), "12345").unwrap();
    fs::write(dir.path().join("tiny.txt"), "1").unwrap();
    fs::write(dir.path().join("skip.LOG"), "12345").unwrap();

    let options = ScanOptions::default()
        .with_min_size(Some(2))
        .with_skip_extensions(vec!["log".to_string()])
        .with_skip_globs(vec!["node_modules/".to_string()]);
    let mut scan = Scanner::new(options).scan(dir.path()).unwrap();
    let records: Vec<FileRecord> = scan.by_ref().collect();

    assert_eq!(records.len(), 1);
    assert!(records[0].path.ends_with("keep.txt"));
    assert!(scan.stats().filtered >= 2);
}

#[test]
fn test_large_files_are_emitted_unhashed() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("big.bin"), vec![0u8; 2048]).unwrap();

    let options = ScanOptions::default().with_large_file_threshold(Some(1024));
    let mut scan = Scanner::new(options).scan(dir.path()).unwrap();
    let records: Vec<FileRecord> = scan.by_ref().collect();

    assert_eq!(records.len(), 1);
    assert!(records[0].fingerprints.is_empty());
    assert_eq!(scan.into_stats().unhashed_large, 1);
}

#[test]
fn test_max_files_stops_early() {
    let dir = TempDir::new().unwrap();
    for i in 0..5 {
        fs::write(dir.path().join(format!("{i}.txt")), format!("{i}")).unwrap();
    }
    let records = scan_all(dir.path(), ScanOptions::default().with_max_files(Some(3)));
    assert_eq!(records.len(), 3);
}

#[test]
fn test_scan_root_errors() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("file.txt");
    fs::write(&file, "x").unwrap();

    assert!(matches!(
        Scanner::new(ScanOptions::default()).scan(&dir.path().join("missing")),
        Err(ScanError::NotFound(_))
    ));
    assert!(matches!(
        Scanner::new(ScanOptions::default()).scan(&file),
        Err(ScanError::NotADirectory(_))
    ));
}

#[test]
fn test_report_roundtrip_through_jsonl() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("a.txt"), "same").unwrap();
    fs::write(data.join("b.txt"), "same").unwrap();

    let records = scan_all(&data, ScanOptions::default());
    let report = dir.path().join("scan.jsonl");
    let mut writer = JsonLinesWriter::new(BufWriter::new(File::create(&report).unwrap()));
    for record in &records {
        writer.write(record).unwrap();
    }
    writer.finish().unwrap();

    let text = fs::read_to_string(&report).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|l| l.contains("\"exact_hash\"")));

    let back: Vec<FileRecord> = read_json_lines(&report).unwrap();
    assert_eq!(back, records);
}
