//! Depth-first directory traversal.
//!
//! # Overview
//!
//! [`Walker`] wraps `walkdir` and yields candidate file paths in a stable
//! order (children sorted by file name). It owns the decisions that can be
//! made from a directory listing alone:
//!
//! - directories matching a skip glob are pruned without being read
//! - files matching a skip glob are dropped
//! - symbolic links are dropped unless links are followed
//! - listing errors (permission denied, symlink cycles, broken links)
//!   become [`ScanError`]s for the caller to report and skip
//!
//! Everything that needs a `stat` (size filters, modification time) is left
//! to the scanner, because the file may change between listing and stat.
//!
//! # Example
//!
//! ```no_run
//! use drivetidy::scanner::walker::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/data"), &["*.tmp".to_string()], false);
//! for item in walker {
//!     match item {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::patterns::PatternSet;
use super::ScanError;

/// Iterator over candidate files under a root directory.
pub struct Walker {
    entries: walkdir::IntoIter,
    patterns: PatternSet,
    pruned_dirs: Vec<PathBuf>,
    follow_symlinks: bool,
    excluded: usize,
}

impl Walker {
    /// Create a walker for `root`.
    ///
    /// `skip_globs` use gitignore semantics relative to `root`.
    #[must_use]
    pub fn new<S: AsRef<str>>(root: &Path, skip_globs: &[S], follow_symlinks: bool) -> Self {
        let entries = WalkDir::new(root)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        Self {
            entries,
            patterns: PatternSet::new(root, skip_globs),
            pruned_dirs: Vec::new(),
            follow_symlinks,
            excluded: 0,
        }
    }

    /// Number of entries dropped by skip globs or the symlink policy.
    #[must_use]
    pub fn excluded(&self) -> usize {
        self.excluded
    }

    /// Never descend into `dir` (for example a destination inside the source).
    #[must_use]
    pub fn with_pruned_dir(mut self, dir: PathBuf) -> Self {
        self.pruned_dirs.push(dir);
        self
    }

    fn convert_error(error: walkdir::Error) -> ScanError {
        let path = error.path().map(Path::to_path_buf).unwrap_or_default();

        if let Some(ancestor) = error.loop_ancestor() {
            log::debug!(
                "Symlink cycle at {} (points back to {})",
                path.display(),
                ancestor.display()
            );
            return ScanError::SymlinkLoop {
                path,
                ancestor: ancestor.to_path_buf(),
            };
        }

        let message = error.to_string();
        match error.into_io_error() {
            Some(source) => handle_io_error(&path, source),
            None => ScanError::Io {
                path,
                source: io::Error::other(message),
            },
        }
    }
}

impl Iterator for Walker {
    type Item = Result<PathBuf, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(error) => return Some(Err(Self::convert_error(error))),
            };

            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                if self.patterns.is_match(entry.path(), true)
                    || self.pruned_dirs.iter().any(|d| d == entry.path())
                {
                    log::debug!("Pruning excluded directory: {}", entry.path().display());
                    self.excluded += 1;
                    self.entries.skip_current_dir();
                }
                continue;
            }

            if entry.path_is_symlink() && !self.follow_symlinks {
                log::debug!("Skipping symbolic link: {}", entry.path().display());
                self.excluded += 1;
                continue;
            }

            if !file_type.is_file() {
                log::trace!("Skipping special file: {}", entry.path().display());
                continue;
            }

            if self.patterns.is_match(entry.path(), false) {
                log::trace!("Excluded by glob: {}", entry.path().display());
                self.excluded += 1;
                continue;
            }

            return Some(Ok(entry.into_path()));
        }
    }
}

/// Map an I/O error on `path` to the matching [`ScanError`] variant.
pub(crate) fn handle_io_error(path: &Path, error: io::Error) -> ScanError {
    match error.kind() {
        io::ErrorKind::PermissionDenied => ScanError::PermissionDenied(path.to_path_buf()),
        io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
        _ => ScanError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("c.tmp"), "c").unwrap();
        fs::write(dir.path().join("sub").join("d.txt"), "d").unwrap();
        fs::create_dir(dir.path().join("cache")).unwrap();
        fs::write(dir.path().join("cache").join("e.txt"), "e").unwrap();
        dir
    }

    fn names(dir: &TempDir, walker: Walker) -> Vec<String> {
        walker
            .filter_map(Result::ok)
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_walker_is_sorted_depth_first() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), &[] as &[String], false);
        assert_eq!(
            names(&dir, walker),
            vec!["a.txt", "b.txt", "cache/e.txt", "sub/c.tmp", "sub/d.txt"]
        );
    }

    #[test]
    fn test_walker_skip_globs_prune_and_filter() {
        let dir = create_test_dir();
        let mut walker = Walker::new(
            dir.path(),
            &["*.tmp".to_string(), "cache/".to_string()],
            false,
        );
        let found: Vec<_> = walker.by_ref().filter_map(Result::ok).collect();
        assert_eq!(found.len(), 3);
        assert_eq!(walker.excluded(), 2);
    }

    #[test]
    fn test_walker_pruned_dir() {
        let dir = create_test_dir();
        let walker = Walker::new(dir.path(), &[] as &[String], false)
            .with_pruned_dir(dir.path().join("sub"));
        assert_eq!(names(&dir, walker), vec!["a.txt", "b.txt", "cache/e.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walker_skips_symlinks_unless_following() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
            .unwrap();

        let plain = Walker::new(dir.path(), &[] as &[String], false);
        assert_eq!(names(&dir, plain), vec!["real.txt"]);

        let following = Walker::new(dir.path(), &[] as &[String], true);
        assert_eq!(names(&dir, following), vec!["link.txt", "real.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_walker_reports_broken_link_when_following() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("dangling"))
            .unwrap();
        fs::write(dir.path().join("ok.txt"), "ok").unwrap();

        let results: Vec<_> = Walker::new(dir.path(), &[] as &[String], true).collect();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|r| r.is_err()));
        assert!(results.iter().any(|r| r.is_ok()));
    }

    #[test]
    fn test_handle_io_error_kinds() {
        let p = Path::new("/x");
        assert!(matches!(
            handle_io_error(p, io::Error::from(io::ErrorKind::NotFound)),
            ScanError::NotFound(_)
        ));
        assert!(matches!(
            handle_io_error(p, io::Error::from(io::ErrorKind::PermissionDenied)),
            ScanError::PermissionDenied(_)
        ));
    }
}
