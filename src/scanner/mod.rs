//! Scanner module for directory traversal and fingerprinting.
//!
//! This module provides functionality for:
//! - Sorted, depth-first directory walking using walkdir
//! - Size, extension and glob filtering
//! - Multi-namespace fingerprinting (BLAKE3, pHash, text, SimHash)
//! - Incremental rescans through the persistent [`HashCache`]
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and glob pruning
//! - [`fingerprint`]: Namespaces and the engine computing them
//! - [`hasher`]: BLAKE3 file hashing (streaming)
//! - [`perceptual`], [`document`], [`fuzzy`]: optional namespaces
//! - [`patterns`], [`path_utils`]: glob matching and path helpers
//!
//! [`Scanner::scan`] returns a lazy [`Scan`] iterator: one file is stat'ed,
//! fingerprinted and emitted per `next()` call. Files that vanish or cannot
//! be read are logged as warnings, recorded in [`ScanStats`] and skipped.
//!
//! # Example
//!
//! ```no_run
//! use drivetidy::scanner::{ScanOptions, Scanner};
//! use std::path::Path;
//!
//! let options = ScanOptions::default().with_min_size(Some(1024));
//! let mut scan = Scanner::new(options).scan(Path::new("/data")).unwrap();
//! for record in scan.by_ref() {
//!     println!("{} {}", record.path.display(), record.size);
//! }
//! println!("{}", scan.stats().summary());
//! ```

pub mod document;
pub mod fingerprint;
pub mod fuzzy;
pub mod hasher;
pub mod path_utils;
pub mod patterns;
pub mod perceptual;
pub mod walker;

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytesize::ByteSize;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, HashCache};
use crate::progress::ProgressCallback;

// Re-export main types
pub use fingerprint::{FingerprintEngine, Fingerprints, Namespace};
pub use hasher::{hash_to_hex, hex_to_hash, Hash, Hasher};
pub use perceptual::PerceptualAlgorithm;
pub use walker::Walker;

/// Files above this size get no fingerprints unless the threshold is lifted.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 200 * 1024 * 1024;

/// One scanned file.
///
/// Serializes to a single JSON object:
/// `{path, size, modified, extension, <namespace>_hash?}` where each hash
/// field is present only when that namespace was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RecordLine", from = "RecordLine")]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time, seconds since the Unix epoch
    pub modified: f64,
    /// Lowercase extension with its leading dot, empty when absent
    pub extension: String,
    /// Computed fingerprints by namespace
    pub fingerprints: Fingerprints,
}

impl FileRecord {
    /// Create a record without fingerprints; the extension is derived from `path`.
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: f64) -> Self {
        let extension = extension_of(&path);
        Self {
            path,
            size,
            modified,
            extension,
            fingerprints: Fingerprints::new(),
        }
    }

    /// Add or replace one fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, namespace: Namespace, value: impl Into<String>) -> Self {
        self.fingerprints.insert(namespace, value.into());
        self
    }

    /// Fingerprint value in `namespace`, if computed.
    #[must_use]
    pub fn fingerprint(&self, namespace: Namespace) -> Option<&str> {
        self.fingerprints.get(&namespace).map(String::as_str)
    }
}

/// Flat wire shape of a [`FileRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordLine {
    path: PathBuf,
    size: u64,
    modified: f64,
    #[serde(default)]
    extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exact_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    perceptual_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fuzzy_hash: Option<String>,
}

impl From<FileRecord> for RecordLine {
    fn from(mut record: FileRecord) -> Self {
        Self {
            exact_hash: record.fingerprints.remove(&Namespace::Exact),
            perceptual_hash: record.fingerprints.remove(&Namespace::Perceptual),
            text_hash: record.fingerprints.remove(&Namespace::Text),
            fuzzy_hash: record.fingerprints.remove(&Namespace::Fuzzy),
            path: record.path,
            size: record.size,
            modified: record.modified,
            extension: record.extension,
        }
    }
}

impl From<RecordLine> for FileRecord {
    fn from(line: RecordLine) -> Self {
        let fingerprints = [
            (Namespace::Exact, line.exact_hash),
            (Namespace::Perceptual, line.perceptual_hash),
            (Namespace::Text, line.text_hash),
            (Namespace::Fuzzy, line.fuzzy_hash),
        ]
        .into_iter()
        .filter_map(|(ns, value)| value.map(|v| (ns, v)))
        .collect();

        let extension = if line.extension.is_empty() {
            extension_of(&line.path)
        } else {
            normalize_extension(&line.extension)
        };

        Self {
            path: line.path,
            size: line.size,
            modified: line.modified,
            extension,
            fingerprints,
        }
    }
}

/// Lowercase, dotted extension of a path (`""` when there is none).
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| normalize_extension(&ext.to_string_lossy()))
        .unwrap_or_default()
}

/// Normalize `"JPG"`, `".JPG"` or `"jpg"` to `".jpg"`.
#[must_use]
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

/// Modification time as floating-point seconds since the epoch.
#[must_use]
pub fn mtime_secs(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Modification time as integer nanoseconds since the epoch.
///
/// This is the exact value the cache compares; it saturates far outside
/// any real timestamp.
#[must_use]
pub fn mtime_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_nanos()).unwrap_or(i64::MAX),
        Err(e) => i64::try_from(e.duration().as_nanos())
            .map(|n| -n)
            .unwrap_or(i64::MIN),
    }
}

/// Options controlling one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,
    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,
    /// Extensions to exclude, case-insensitive, with or without the dot.
    pub skip_extensions: Vec<String>,
    /// Glob patterns to exclude (gitignore-style, relative to the root).
    pub skip_globs: Vec<String>,
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,
    /// Files larger than this are emitted with an empty fingerprint map.
    /// `None` fingerprints every file.
    pub large_file_threshold: Option<u64>,
    /// Optional namespaces to compute in addition to `exact`.
    pub namespaces: BTreeSet<Namespace>,
    /// Perceptual hashing algorithm.
    pub perceptual_algorithm: PerceptualAlgorithm,
    /// Stop after emitting this many records.
    pub max_files: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_size: None,
            max_size: None,
            skip_extensions: Vec::new(),
            skip_globs: Vec::new(),
            follow_symlinks: false,
            large_file_threshold: Some(DEFAULT_LARGE_FILE_THRESHOLD),
            namespaces: BTreeSet::new(),
            perceptual_algorithm: PerceptualAlgorithm::default(),
            max_files: None,
        }
    }
}

impl ScanOptions {
    /// Set the minimum size filter.
    #[must_use]
    pub fn with_min_size(mut self, min_size: Option<u64>) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the maximum size filter.
    #[must_use]
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set excluded extensions.
    #[must_use]
    pub fn with_skip_extensions(mut self, extensions: Vec<String>) -> Self {
        self.skip_extensions = extensions;
        self
    }

    /// Set excluded glob patterns.
    #[must_use]
    pub fn with_skip_globs(mut self, globs: Vec<String>) -> Self {
        self.skip_globs = globs;
        self
    }

    /// Enable/disable following symbolic links.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Set the size above which files are not fingerprinted.
    #[must_use]
    pub fn with_large_file_threshold(mut self, threshold: Option<u64>) -> Self {
        self.large_file_threshold = threshold;
        self
    }

    /// Request an optional namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.insert(namespace);
        self
    }

    /// Stop after `max_files` records.
    #[must_use]
    pub fn with_max_files(mut self, max_files: Option<usize>) -> Self {
        self.max_files = max_files;
        self
    }

    /// Every namespace a scan computes: `exact` plus the optional ones.
    #[must_use]
    pub fn requested_namespaces(&self) -> BTreeSet<Namespace> {
        let mut requested = self.namespaces.clone();
        requested.insert(Namespace::Exact);
        requested
    }

    fn passes_size_filter(&self, size: u64) -> bool {
        self.min_size.is_none_or(|min| size >= min) && self.max_size.is_none_or(|max| size <= max)
    }

    fn is_extension_skipped(&self, extension: &str) -> bool {
        !extension.is_empty()
            && self
                .skip_extensions
                .iter()
                .any(|skip| normalize_extension(skip) == extension)
    }
}

/// A file that was listed but not emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Path that was skipped
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Counters collected while a scan runs.
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    /// Records emitted
    pub processed: usize,
    /// Files dropped by size, extension, glob or symlink filters
    pub filtered: usize,
    /// Files that could not be stat'ed or read
    pub skipped: Vec<SkippedFile>,
    /// Files whose cached fingerprints were reused
    pub cache_hits: usize,
    /// Files fingerprinted from scratch
    pub cache_misses: usize,
    /// Files above the large-file threshold (emitted without fingerprints)
    pub unhashed_large: usize,
    /// Bytes covered by emitted records
    pub total_bytes: u64,
}

impl ScanStats {
    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} file(s) ({}), {} filtered, {} skipped, cache {} hit(s) / {} miss(es)",
            self.processed,
            ByteSize(self.total_bytes),
            self.filtered,
            self.skipped.len(),
            self.cache_hits,
            self.cache_misses
        )
    }
}

/// Walks a tree and produces [`FileRecord`]s.
pub struct Scanner {
    options: ScanOptions,
    engine: FingerprintEngine,
    cache: Option<Arc<HashCache>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Scanner {
    /// Create a scanner without a cache.
    #[must_use]
    pub fn new(options: ScanOptions) -> Self {
        let engine = FingerprintEngine::new(options.perceptual_algorithm);
        Self {
            options,
            engine,
            cache: None,
            progress: None,
        }
    }

    /// Consult and update `cache` for every file.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<HashCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Report per-file progress.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Start scanning `root`.
    ///
    /// # Errors
    ///
    /// Fails only if `root` itself is missing, unreadable or not a directory;
    /// problems with individual files are reported through [`ScanStats`].
    pub fn scan(self, root: &Path) -> Result<Scan, ScanError> {
        let root = path_utils::absolute_path(root).map_err(|e| walker::handle_io_error(root, e))?;
        let metadata = fs::metadata(&root).map_err(|e| walker::handle_io_error(&root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }

        log::info!("Scanning {}", root.display());
        if let Some(progress) = &self.progress {
            progress.on_phase_start("scanning", 0);
        }

        let walker = Walker::new(&root, &self.options.skip_globs, self.options.follow_symlinks);
        Ok(Scan {
            requested: self.options.requested_namespaces(),
            scanner: self,
            walker,
            stats: ScanStats::default(),
            finished: false,
        })
    }
}

/// Scan `root` with `options` and no cache.
///
/// # Errors
///
/// See [`Scanner::scan`].
pub fn scan(root: &Path, options: ScanOptions) -> Result<Scan, ScanError> {
    Scanner::new(options).scan(root)
}

/// Lazy stream of records from one scan.
pub struct Scan {
    scanner: Scanner,
    walker: Walker,
    requested: BTreeSet<Namespace>,
    stats: ScanStats,
    finished: bool,
}

impl Scan {
    /// Counters so far. Walker exclusions are folded into `filtered` once
    /// the scan is exhausted.
    #[must_use]
    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Consume the scan and keep its counters.
    #[must_use]
    pub fn into_stats(mut self) -> ScanStats {
        self.finish();
        self.stats
    }

    fn skip(&mut self, path: PathBuf, reason: String) {
        log::warn!("Skipping {}: {}", path.display(), reason);
        self.stats.skipped.push(SkippedFile { path, reason });
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.stats.filtered += self.walker.excluded();
        if let Some(progress) = &self.scanner.progress {
            progress.on_phase_end("scanning");
        }
        log::info!("{}", self.stats.summary());
    }

    fn process(&mut self, path: PathBuf) -> Option<FileRecord> {
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                let reason = walker::handle_io_error(&path, e).to_string();
                self.skip(path, reason);
                return None;
            }
        };
        if !metadata.is_file() {
            self.stats.filtered += 1;
            return None;
        }

        let size = metadata.len();
        let extension = extension_of(&path);
        let options = &self.scanner.options;
        if !options.passes_size_filter(size) || options.is_extension_skipped(&extension) {
            log::trace!("Filtered: {}", path.display());
            self.stats.filtered += 1;
            return None;
        }

        let modified = match metadata.modified() {
            Ok(time) => time,
            Err(e) => {
                self.skip(path, format!("no modification time: {e}"));
                return None;
            }
        };

        let mut record = FileRecord::new(path, size, mtime_secs(modified));

        let large = self
            .scanner
            .options
            .large_file_threshold
            .is_some_and(|limit| size > limit);
        if large {
            log::debug!(
                "Not fingerprinting large file {} ({})",
                record.path.display(),
                ByteSize(size)
            );
            self.stats.unhashed_large += 1;
        } else {
            match self.fingerprints_for(&record.path, size, mtime_nanos(modified), &extension) {
                Ok(fingerprints) => record.fingerprints = fingerprints,
                Err(e) => {
                    self.skip(record.path, e.to_string());
                    return None;
                }
            }
        }

        self.stats.processed += 1;
        self.stats.total_bytes += size;
        if let Some(progress) = &self.scanner.progress {
            progress.on_progress(self.stats.processed, &record.path.to_string_lossy());
            progress.on_item_completed(size);
        }
        Some(record)
    }

    fn fingerprints_for(
        &mut self,
        path: &Path,
        size: u64,
        mtime_ns: i64,
        extension: &str,
    ) -> Result<Fingerprints, HashError> {
        let Some(cache) = self.scanner.cache.clone() else {
            self.stats.cache_misses += 1;
            return self.scanner.engine.compute(path, extension, &self.requested);
        };

        let cached = match cache.lookup(path) {
            Ok(entry) => entry.filter(|entry| entry.is_valid_for(size, mtime_ns)),
            Err(e) => {
                log::warn!("Cache lookup failed for {}: {}", path.display(), e);
                None
            }
        };

        let entry = match cached {
            Some(mut entry) => {
                let missing = entry.missing(&self.requested);
                if missing.is_empty() {
                    log::trace!("Cache hit: {}", path.display());
                    self.stats.cache_hits += 1;
                    return Ok(entry.fingerprints);
                }
                log::trace!(
                    "Cache hit for {} but computing {} new namespace(s)",
                    path.display(),
                    missing.len()
                );
                self.stats.cache_hits += 1;
                let extra = self.scanner.engine.compute(path, extension, &missing)?;
                entry.fingerprints.extend(extra);
                entry.computed.extend(missing);
                entry
            }
            None => {
                log::trace!("Cache miss: {}", path.display());
                self.stats.cache_misses += 1;
                let fingerprints = self.scanner.engine.compute(path, extension, &self.requested)?;
                CacheEntry::new(
                    path.to_path_buf(),
                    size,
                    mtime_ns,
                    fingerprints,
                    self.requested.clone(),
                )
            }
        };

        if let Err(e) = cache.store(&entry) {
            log::warn!("Failed to update cache for {}: {}", path.display(), e);
        }
        Ok(entry.fingerprints)
    }
}

impl Iterator for Scan {
    type Item = FileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self
            .scanner
            .options
            .max_files
            .is_some_and(|max| self.stats.processed >= max)
        {
            log::info!("Reached max_files limit");
            self.finish();
            return None;
        }

        loop {
            match self.walker.next() {
                None => {
                    self.finish();
                    return None;
                }
                Some(Err(e)) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.skip(path, e.to_string());
                }
                Some(Ok(path)) => {
                    if let Some(record) = self.process(path) {
                        return Some(record);
                    }
                }
            }
        }
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Following links led back to an ancestor directory.
    #[error("Symlink cycle: {path} points back to {ancestor}")]
    SymlinkLoop {
        /// Link that closes the cycle
        path: PathBuf,
        /// Directory it points back to
        ancestor: PathBuf,
    },

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => Some(p),
            Self::SymlinkLoop { path, .. } | Self::Io { path, .. } => Some(path),
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl HashError {
    /// Classify an I/O error raised while reading `path`.
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
}
