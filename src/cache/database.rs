//! SQLite-backed fingerprint cache database.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE file_fingerprints (
//!     path         TEXT PRIMARY KEY,
//!     size         INTEGER NOT NULL,
//!     mtime_ns     INTEGER NOT NULL,
//!     fingerprints TEXT NOT NULL,  -- JSON object: namespace -> value
//!     computed     TEXT NOT NULL,  -- JSON array of attempted namespaces
//!     updated_at   INTEGER NOT NULL
//! );
//! ```
//!
//! The database runs in WAL mode so other processes can read while a scan
//! writes. Writers inside this process are serialized by a mutex around the
//! connection; every `store` is a single upsert statement.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::entry::CacheEntry;
use crate::scanner::{Fingerprints, Namespace};

/// Value of `PRAGMA user_version` written by this schema.
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file_fingerprints (
        path         TEXT PRIMARY KEY,
        size         INTEGER NOT NULL,
        mtime_ns     INTEGER NOT NULL,
        fingerprints TEXT NOT NULL,
        computed     TEXT NOT NULL,
        updated_at   INTEGER NOT NULL
    );
";

/// Errors raised by the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The database file could not be opened or is not a SQLite database.
    #[error("Failed to open cache database {path}: {source}")]
    Open {
        /// Database path
        path: PathBuf,
        /// Underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The database was written by an incompatible schema.
    #[error("Cache schema version {found} does not match expected version {expected}")]
    SchemaMismatch {
        /// Version found in the file
        found: i32,
        /// Version this build writes
        expected: i32,
    },

    /// The cache directory could not be created.
    #[error("Failed to create cache directory {path}: {source}")]
    Io {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A query failed.
    #[error("Cache database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("Cache connection lock poisoned")]
    LockPoisoned,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Persistent cache for file fingerprints using SQLite.
pub struct HashCache {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl HashCache {
    /// Opens or creates a cache at the specified path.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] if the file is not a SQLite database and
    /// [`CacheError::SchemaMismatch`] if it was written by another schema.
    pub fn new(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path).map_err(|source| CacheError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::initialize(&conn).map_err(|e| match e {
            CacheError::Database(source) => CacheError::Open {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        log::debug!("Opened fingerprint cache at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a throwaway in-memory cache.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot initialize the schema.
    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Open the cache, or log a warning and run without one.
    ///
    /// A corrupt or incompatible cache only disables caching; the scan
    /// recomputes every fingerprint instead.
    #[must_use]
    pub fn open_or_warn(path: &Path) -> Option<Self> {
        match Self::new(path) {
            Ok(cache) => Some(cache),
            Err(e) => {
                log::warn!("Fingerprint cache disabled: {}", e);
                None
            }
        }
    }

    fn initialize(conn: &Connection) -> CacheResult<()> {
        conn.busy_timeout(Duration::from_secs(5))?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => {
                conn.execute_batch(CREATE_SCHEMA)?;
                conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
                log::debug!("Initialized cache schema version {}", SCHEMA_VERSION);
            }
            SCHEMA_VERSION => {}
            found => {
                return Err(CacheError::SchemaMismatch {
                    found,
                    expected: SCHEMA_VERSION,
                })
            }
        }

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Path of the database file, `None` for an in-memory cache.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Look up the entry for `path`.
    ///
    /// Rows whose JSON columns cannot be decoded are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the query itself fails.
    pub fn lookup(&self, path: &Path) -> CacheResult<Option<CacheEntry>> {
        let key = path.to_string_lossy();
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT size, mtime_ns, fingerprints, computed
                 FROM file_fingerprints WHERE path = ?1",
                params![key.as_ref()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        drop(conn);

        let Some((size, mtime_ns, fingerprints, computed)) = row else {
            return Ok(None);
        };

        let decoded = serde_json::from_str::<Fingerprints>(&fingerprints).and_then(|fp| {
            serde_json::from_str::<BTreeSet<Namespace>>(&computed).map(|c| (fp, c))
        });
        match decoded {
            Ok((fingerprints, computed)) => Ok(Some(CacheEntry::new(
                path.to_path_buf(),
                u64::try_from(size).unwrap_or_default(),
                mtime_ns,
                fingerprints,
                computed,
            ))),
            Err(e) => {
                log::warn!("Ignoring unreadable cache row for {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Insert or replace the entry for `entry.path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the upsert fails.
    pub fn store(&self, entry: &CacheEntry) -> CacheResult<()> {
        let fingerprints = serde_json::to_string(&entry.fingerprints)
            .map_err(|e| CacheError::Database(rusqlite::Error::ToSqlConversionFailure(e.into())))?;
        let computed = serde_json::to_string(&entry.computed)
            .map_err(|e| CacheError::Database(rusqlite::Error::ToSqlConversionFailure(e.into())))?;
        let key = entry.path.to_string_lossy();
        let size = i64::try_from(entry.size).unwrap_or(i64::MAX);

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO file_fingerprints (path, size, mtime_ns, fingerprints, computed, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(path) DO UPDATE SET
                 size = excluded.size,
                 mtime_ns = excluded.mtime_ns,
                 fingerprints = excluded.fingerprints,
                 computed = excluded.computed,
                 updated_at = excluded.updated_at",
            params![
                key.as_ref(),
                size,
                entry.mtime_ns,
                fingerprints,
                computed,
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }

    /// Number of cached paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn len(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM file_fingerprints", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// True when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Remove every entry, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> CacheResult<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM file_fingerprints", [])?;
        log::info!("Cleared {} cache entr(ies)", removed);
        Ok(removed)
    }

    /// Close the connection, flushing the WAL.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite reports a failure while closing.
    pub fn close(self) -> CacheResult<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| CacheError::LockPoisoned)?;
        conn.close().map_err(|(_, e)| CacheError::Database(e))
    }
}
