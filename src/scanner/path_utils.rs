//! Path helpers shared by the scanner, glob matching and organizers.
//!
//! # Unicode normalization
//!
//! macOS uses NFD (Decomposed) normalization for file names, while Windows
//! and Linux typically use NFC (Composed). The same visible name can
//! therefore arrive as different bytes:
//!
//! - NFC: `café.txt` - 'é' is U+00E9 (single code point)
//! - NFD: `café.txt` - 'e' U+0065 + combining acute accent U+0301
//!
//! Relative keys used for glob matching are normalized to NFC so that a
//! rule written on one platform matches files created on another.
//!
//! # Example
//!
//! ```
//! use drivetidy::scanner::path_utils::{normalize_path_str, relative_key};
//! use std::path::Path;
//!
//! assert_eq!(normalize_path_str("cafe\u{0301}.txt"), "café.txt");
//! assert_eq!(
//!     relative_key(Path::new("/data"), Path::new("/data/photos/cafe\u{0301}.png")),
//!     "photos/café.png"
//! );
//! ```

use std::io;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    s.nfc().collect()
}

/// Relative, `/`-separated, NFC-normalized form of `path` under `root`.
///
/// Paths outside `root` keep their own normal components. The root itself
/// yields an empty string.
#[must_use]
pub fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let joined = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");
    normalize_path_str(&joined)
}

/// Make a path absolute against the current directory without touching symlinks.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn absolute_path(path: &Path) -> io::Result<PathBuf> {
    std::path::absolute(path)
}

/// Path made only of the normal components of `path`.
///
/// Used to mirror an absolute source path under another root, e.g.
/// `/home/a/x.txt` becomes `home/a/x.txt`.
#[must_use]
pub fn strip_root(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect()
}
