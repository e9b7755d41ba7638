//! Gitignore-style glob matching relative to a root directory.
//!
//! Skip globs, tag rules and category routes all match paths the same way:
//! patterns follow `.gitignore` semantics (`*.tmp` matches at any depth,
//! `build/` matches directories only, a leading `/` anchors at the root, and
//! `!pattern` re-includes), and are evaluated against the path relative to
//! the root with `/` separators and NFC-normalized names. A file also
//! matches when one of its parent directories matches.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::path_utils::relative_key;

/// A compiled set of glob patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    root: PathBuf,
    matcher: Option<Gitignore>,
}

impl PatternSet {
    /// Compile `patterns` for paths under `root`.
    ///
    /// Invalid patterns are logged and ignored.
    pub fn new<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid glob pattern '{}': {}", pattern, e);
            }
        }

        let matcher = match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build glob patterns: {}", e);
                None
            }
        };

        Self {
            root: root.to_path_buf(),
            matcher,
        }
    }

    /// A set that matches nothing.
    #[must_use]
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            matcher: None,
        }
    }

    /// True when no usable pattern was compiled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matcher.is_none()
    }

    /// Root the patterns are relative to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check a path (absolute under the root, or already relative).
    #[must_use]
    pub fn is_match(&self, path: &Path, is_dir: bool) -> bool {
        let Some(matcher) = &self.matcher else {
            return false;
        };
        let key = relative_key(&self.root, path);
        if key.is_empty() {
            return false;
        }
        matcher
            .matched_path_or_any_parents(Path::new(&key), is_dir)
            .is_ignore()
    }
}
