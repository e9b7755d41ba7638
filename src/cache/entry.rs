//! Cache entry definitions.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{Fingerprints, Namespace};

/// Last known state of one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Absolute path (the key)
    pub path: PathBuf,
    /// Size when the fingerprints were computed
    pub size: u64,
    /// Modification time in nanoseconds when the fingerprints were computed
    pub mtime_ns: i64,
    /// Fingerprints that produced a value
    pub fingerprints: Fingerprints,
    /// Namespaces that were attempted, including ones that produced nothing
    pub computed: BTreeSet<Namespace>,
}

impl CacheEntry {
    /// Create a new entry.
    #[must_use]
    pub fn new(
        path: PathBuf,
        size: u64,
        mtime_ns: i64,
        fingerprints: Fingerprints,
        computed: BTreeSet<Namespace>,
    ) -> Self {
        Self {
            path,
            size,
            mtime_ns,
            fingerprints,
            computed,
        }
    }

    /// An entry is reusable only when size and mtime both match exactly.
    #[must_use]
    pub fn is_valid_for(&self, size: u64, mtime_ns: i64) -> bool {
        self.size == size && self.mtime_ns == mtime_ns
    }

    /// Requested namespaces this entry never attempted.
    #[must_use]
    pub fn missing(&self, requested: &BTreeSet<Namespace>) -> BTreeSet<Namespace> {
        requested.difference(&self.computed).copied().collect()
    }
}
