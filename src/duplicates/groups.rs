//! Duplicate grouping by fingerprint namespace.
//!
//! # Overview
//!
//! Grouping partitions a record stream into equivalence classes: two records
//! belong to the same [`DuplicateGroup`] when they carry the same value in the
//! requested [`Namespace`]. Each namespace is grouped independently, so a file
//! can be in an `exact` group and a `perceptual` group at the same time.
//!
//! - Records without a value in the namespace are left out (not an error).
//! - Singleton classes are dropped.
//! - Groups appear in the order their fingerprint was first seen, and members
//!   keep the order of the input stream. Policy-driven ordering belongs to
//!   the keeper selector.
//!
//! # Example
//!
//! ```
//! use drivetidy::scanner::{FileRecord, Namespace};
//! use drivetidy::duplicates::group_by_fingerprint;
//! use std::path::PathBuf;
//!
//! let records = vec![
//!     FileRecord::new(PathBuf::from("/a.txt"), 3, 1.0).with_fingerprint(Namespace::Exact, "x"),
//!     FileRecord::new(PathBuf::from("/b.txt"), 3, 1.0).with_fingerprint(Namespace::Exact, "x"),
//!     FileRecord::new(PathBuf::from("/c.txt"), 4, 1.0).with_fingerprint(Namespace::Exact, "y"),
//! ];
//!
//! let (groups, stats) = group_by_fingerprint(&records, Namespace::Exact);
//!
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].len(), 2);
//! assert_eq!(stats.eliminated_unique, 1);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::Serialize;

use crate::scanner::{FileRecord, Namespace};

/// Files sharing one fingerprint value in one namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Namespace the fingerprint belongs to
    pub namespace: Namespace,
    /// Shared fingerprint value
    pub fingerprint: String,
    /// Members in scan order (always two or more)
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Space held by everything except the largest member.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        let largest = self.files.iter().map(|f| f.size).max().unwrap_or(0);
        self.total_size().saturating_sub(largest)
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}

/// Statistics from one grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupingStats {
    /// Records examined
    pub total_files: usize,
    /// Records without a value in the namespace
    pub missing_fingerprint: usize,
    /// Distinct fingerprint values seen
    pub unique_fingerprints: usize,
    /// Records that ended up in a group
    pub duplicate_files: usize,
    /// Records whose fingerprint was unique
    pub eliminated_unique: usize,
    /// Groups returned
    pub duplicate_groups: usize,
    /// Sum of [`DuplicateGroup::wasted_space`] over returned groups
    pub wasted_space: u64,
}

/// Group `records` by their value in `namespace`.
#[must_use]
pub fn group_by_fingerprint<'a>(
    records: impl IntoIterator<Item = &'a FileRecord>,
    namespace: Namespace,
) -> (Vec<DuplicateGroup>, GroupingStats) {
    let mut stats = GroupingStats::default();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut buckets: Vec<(&str, Vec<&FileRecord>)> = Vec::new();

    for record in records {
        stats.total_files += 1;
        let Some(value) = record.fingerprint(namespace) else {
            stats.missing_fingerprint += 1;
            continue;
        };

        match index.get(value) {
            Some(&slot) => buckets[slot].1.push(record),
            None => {
                index.insert(value, buckets.len());
                buckets.push((value, vec![record]));
            }
        }
    }

    stats.unique_fingerprints = buckets.len();

    let groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter_map(|(fingerprint, members)| {
            if members.len() < 2 {
                stats.eliminated_unique += 1;
                return None;
            }
            log::debug!(
                "{} group {}: {} files",
                namespace,
                fingerprint,
                members.len()
            );
            Some(DuplicateGroup {
                namespace,
                fingerprint: fingerprint.to_string(),
                files: members.into_iter().cloned().collect(),
            })
        })
        .collect();

    stats.duplicate_groups = groups.len();
    stats.duplicate_files = groups.iter().map(DuplicateGroup::len).sum();
    stats.wasted_space = groups.iter().map(DuplicateGroup::wasted_space).sum();

    log::info!(
        "Grouped {} record(s) by {}: {} group(s), {} duplicate file(s)",
        stats.total_files,
        namespace,
        stats.duplicate_groups,
        stats.duplicate_files
    );

    (groups, stats)
}

/// Run [`group_by_fingerprint`] once per namespace.
#[must_use]
pub fn group_all(
    records: &[FileRecord],
    namespaces: impl IntoIterator<Item = Namespace>,
) -> BTreeMap<Namespace, (Vec<DuplicateGroup>, GroupingStats)> {
    namespaces
        .into_iter()
        .map(|ns| (ns, group_by_fingerprint(records, ns)))
        .collect()
}
