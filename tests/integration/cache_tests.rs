use drivetidy::cache::{CacheEntry, HashCache};
use drivetidy::scanner::{mtime_nanos, FileRecord, Fingerprints, Namespace, ScanOptions, ScanStats, Scanner};
use filetime::{set_file_mtime, FileTime};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn scan_with(root: &Path, cache: &Arc<HashCache>, options: ScanOptions) -> (Vec<FileRecord>, ScanStats) {
    let mut scan = Scanner::new(options)
        .with_cache(Arc::clone(cache))
        .scan(root)
        .unwrap();
    let records: Vec<FileRecord> = scan.by_ref().collect();
    (records, scan.into_stats())
}

fn plant_fake(cache: &HashCache, path: &Path, value: &str) {
    let metadata = fs::metadata(path).unwrap();
    let mut fingerprints = Fingerprints::new();
    fingerprints.insert(Namespace::Exact, value.to_string());
    cache
        .store(&CacheEntry::new(
            path.to_path_buf(),
            metadata.len(),
            mtime_nanos(metadata.modified().unwrap()),
            fingerprints,
            BTreeSet::from([Namespace::Exact]),
        ))
        .unwrap();
}

#[test]
fn test_second_scan_uses_cache() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("b.txt"), "beta").unwrap();
    let cache = Arc::new(HashCache::new(&dir.path().join("cache.sqlite3")).unwrap());

    let (first, stats) = scan_with(&root, &cache, ScanOptions::default());
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(cache.len().unwrap(), 2);

    let (second, stats) = scan_with(&root, &cache, ScanOptions::default());
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.cache_misses, 0);
    assert_eq!(first, second);
}

#[test]
fn test_valid_entry_is_trusted() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    let file = root.join("a.txt");
    fs::write(&file, "alpha").unwrap();
    let cache = Arc::new(HashCache::in_memory().unwrap());

    plant_fake(&cache, &file, "fake");
    let (records, stats) = scan_with(&root, &cache, ScanOptions::default());

    assert_eq!(stats.cache_hits, 1);
    assert_eq!(records[0].fingerprint(Namespace::Exact), Some("fake"));
}

#[test]
fn test_mtime_change_invalidates_entry() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    let file = root.join("a.txt");
    fs::write(&file, "alpha").unwrap();
    set_file_mtime(&file, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
    let cache = Arc::new(HashCache::in_memory().unwrap());

    plant_fake(&cache, &file, "fake");
    set_file_mtime(&file, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();
    let (records, stats) = scan_with(&root, &cache, ScanOptions::default());

    assert_eq!(stats.cache_misses, 1);
    assert_ne!(records[0].fingerprint(Namespace::Exact), Some("fake"));
    assert_eq!(records[0].modified, 1_700_000_000.0);
}

#[test]
fn test_new_namespace_is_merged_without_recomputing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    let file = root.join("notes.txt");
    fs::write(&file, "the quick brown fox jumps over the lazy dog, twice over").unwrap();
    let cache = Arc::new(HashCache::in_memory().unwrap());

    plant_fake(&cache, &file, "fake");
    let options = ScanOptions::default().with_namespace(Namespace::Fuzzy);
    let (records, _) = scan_with(&root, &cache, options);

    assert_eq!(records[0].fingerprint(Namespace::Exact), Some("fake"));
    let entry = cache.lookup(&file).unwrap().unwrap();
    assert!(entry.computed.contains(&Namespace::Fuzzy));
    assert_eq!(entry.fingerprints.get(&Namespace::Exact).map(String::as_str), Some("fake"));
}

#[test]
fn test_corrupt_cache_file_is_not_fatal_to_scan() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("data");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    let cache_path = dir.path().join("cache.sqlite3");
    fs::write(&cache_path, "this is not a database, just some text padding it out").unwrap();

    assert!(HashCache::new(&cache_path).is_err());
    assert!(HashCache::open_or_warn(&cache_path).is_none());

    let records: Vec<FileRecord> = Scanner::new(ScanOptions::default())
        .scan(&root)
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
}
