//! Low-level filesystem helpers for the mutation engine.
//!
//! # Platform Support
//!
//! - **Unix**: file identity and device come from `(st_dev, st_ino)`
//! - **Other**: identity is unknown, so "already linked" is never detected
//!   and every pair is assumed to share a device (a failing `hard_link`
//!   call is then reported as unsupported)

use std::ffi::OsString;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of the temporary name a file is moved to while it is replaced.
pub const ASIDE_SUFFIX: &str = ".to_delete";

/// Platform-specific inode key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeKey {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    _phantom: (),
}

impl InodeKey {
    /// Key for the file described by `metadata`; `None` where unsupported.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// True when both paths name the same underlying file.
#[must_use]
pub fn same_file(a: &Metadata, b: &Metadata) -> bool {
    match (InodeKey::from_metadata(a), InodeKey::from_metadata(b)) {
        (Some(ka), Some(kb)) => ka == kb,
        _ => false,
    }
}

/// True when both files live on the same device.
#[cfg(unix)]
#[must_use]
pub fn same_device(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev()
}

#[cfg(not(unix))]
#[must_use]
pub fn same_device(_a: &Metadata, _b: &Metadata) -> bool {
    true
}

/// Whether `error` means "rename across filesystems".
#[must_use]
pub fn is_cross_device_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    // EXDEV / ERROR_NOT_SAME_DEVICE
    #[cfg(unix)]
    let code = 18;
    #[cfg(windows)]
    let code = 17;
    #[cfg(not(any(unix, windows)))]
    let code = -1;
    error.raw_os_error() == Some(code)
}

/// Move `from` to `to` without ever replacing an existing `to`.
///
/// `fs::rename` silently overwrites its destination on Unix, so the move is
/// a `hard_link` (which refuses an existing name atomically) followed by
/// removing `from`. Where no link can be made, such as across devices or on
/// filesystems without hard links, the content is copied into a file opened
/// with `create_new` and `from` is removed afterwards.
///
/// # Errors
///
/// Returns [`io::ErrorKind::AlreadyExists`] when `to` exists, otherwise the
/// link, copy or remove error. A destination created here is removed again
/// before an error is returned.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(e),
        Err(e) => {
            // A missing source would only fail again in the copy.
            if e.kind() == io::ErrorKind::NotFound && fs::symlink_metadata(from).is_err() {
                return Err(e);
            }
            log::debug!(
                "Cannot link {} -> {} ({}), copying",
                from.display(),
                to.display(),
                e
            );
            copy_new(from, to)?;
        }
    }
    if let Err(remove_err) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(remove_err);
    }
    Ok(())
}

/// Copy `from` into a file that must not exist yet, keeping permissions.
fn copy_new(from: &Path, to: &Path) -> io::Result<()> {
    let mut source = File::open(from)?;
    let mut dest = OpenOptions::new().write(true).create_new(true).open(to)?;
    let copied = io::copy(&mut source, &mut dest)
        .and_then(|_| dest.set_permissions(source.metadata()?.permissions()))
        .and_then(|()| dest.sync_all());
    if let Err(e) = copied {
        drop(dest);
        let _ = fs::remove_file(to);
        return Err(e);
    }
    Ok(())
}

/// `<path>.to_delete` (with a counter when that name is taken).
#[must_use]
pub fn aside_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(ASIDE_SUFFIX);
    let candidate = path.with_file_name(&name);
    if !candidate.exists() {
        return candidate;
    }
    (1..)
        .map(|n| {
            let mut numbered = name.clone();
            numbered.push(format!(".{n}"));
            path.with_file_name(numbered)
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Create the parent directories of `path`.
///
/// # Errors
///
/// Returns the error from `create_dir_all`.
pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
