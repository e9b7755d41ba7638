//! Keeper selection.
//!
//! A [`KeeperPolicy`] is a total order over the members of a group; the
//! keeper is the minimum under that order. Every policy ends its tie-break
//! chain on the path itself, so two distinct records never compare equal
//! and selection does not depend on input order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scanner::fingerprint::unknown_name_message;
use crate::scanner::FileRecord;

/// Strategy for choosing which file of a duplicate group survives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeeperPolicy {
    /// Most recently modified file
    Newest,
    /// Largest file
    Largest,
    /// Lexicographically smallest path
    #[default]
    #[serde(alias = "alpha")]
    Alphabetical,
    /// Shortest path
    #[serde(alias = "shortestpath")]
    ShortestPath,
}

impl KeeperPolicy {
    /// All policies.
    pub const ALL: [KeeperPolicy; 4] = [
        Self::Newest,
        Self::Largest,
        Self::Alphabetical,
        Self::ShortestPath,
    ];

    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Largest => "largest",
            Self::Alphabetical => "alphabetical",
            Self::ShortestPath => "shortest-path",
        }
    }

    /// Order two records; `Less` means `a` is preferred as keeper.
    #[must_use]
    pub fn compare(self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            Self::Newest => b
                .modified
                .total_cmp(&a.modified)
                .then_with(|| by_path_length(a, b)),
            Self::Largest => b.size.cmp(&a.size).then_with(|| by_path_length(a, b)),
            Self::Alphabetical => a.path.as_os_str().cmp(b.path.as_os_str()),
            Self::ShortestPath => by_path_length(a, b),
        }
    }
}

/// Shorter path first, then lexicographic.
fn by_path_length(a: &FileRecord, b: &FileRecord) -> Ordering {
    let (pa, pb) = (a.path.as_os_str(), b.path.as_os_str());
    pa.len().cmp(&pb.len()).then_with(|| pa.cmp(pb))
}

impl fmt::Display for KeeperPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeeperPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "largest" => Ok(Self::Largest),
            "alphabetical" | "alpha" => Ok(Self::Alphabetical),
            "shortest-path" | "shortestpath" | "shortest_path" => Ok(Self::ShortestPath),
            other => {
                let names: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                Err(unknown_name_message("keeper policy", other, &names))
            }
        }
    }
}

/// Pick the keeper of `group`; `None` only for an empty slice.
#[must_use]
pub fn select_keeper(group: &[FileRecord], policy: KeeperPolicy) -> Option<&FileRecord> {
    group.iter().min_by(|a, b| policy.compare(a, b))
}

/// Split `group` into its keeper and the mutation targets (in group order).
#[must_use]
pub fn partition(group: &[FileRecord], policy: KeeperPolicy) -> Option<(&FileRecord, Vec<&FileRecord>)> {
    let keeper = select_keeper(group, policy)?;
    let targets = group
        .iter()
        .filter(|record| !std::ptr::eq(*record, keeper))
        .collect();
    Some((keeper, targets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn rec(path: &str, size: u64, modified: f64) -> FileRecord {
        FileRecord::new(PathBuf::from(path), size, modified)
    }

    fn keeper_path(group: &[FileRecord], policy: KeeperPolicy) -> PathBuf {
        select_keeper(group, policy).unwrap().path.clone()
    }

    #[test]
    fn test_alphabetical_is_default() {
        assert_eq!(KeeperPolicy::default(), KeeperPolicy::Alphabetical);
        let group = vec![rec("/d/b.txt", 1, 0.0), rec("/d/a.txt", 1, 0.0)];
        assert_eq!(keeper_path(&group, KeeperPolicy::Alphabetical), PathBuf::from("/d/a.txt"));
    }

    #[test]
    fn test_newest_with_tie_breaks() {
        let group = vec![
            rec("/long/path/x.txt", 1, 5.0),
            rec("/b.txt", 1, 5.0),
            rec("/a.txt", 1, 5.0),
            rec("/old.txt", 1, 1.0),
        ];
        assert_eq!(keeper_path(&group, KeeperPolicy::Newest), PathBuf::from("/a.txt"));
    }

    #[test]
    fn test_largest_with_tie_breaks() {
        let group = vec![
            rec("/zz/big.bin", 100, 0.0),
            rec("/big.bin", 100, 0.0),
            rec("/small.bin", 10, 0.0),
        ];
        assert_eq!(keeper_path(&group, KeeperPolicy::Largest), PathBuf::from("/big.bin"));
    }

    #[test]
    fn test_shortest_path() {
        let group = vec![rec("/deep/dir/f", 1, 0.0), rec("/b/f", 1, 0.0), rec("/a/f", 1, 0.0)];
        assert_eq!(keeper_path(&group, KeeperPolicy::ShortestPath), PathBuf::from("/a/f"));
    }

    #[test]
    fn test_selection_independent_of_order() {
        let mut group = vec![rec("/c", 3, 3.0), rec("/a", 1, 1.0), rec("/b", 2, 2.0)];
        for policy in KeeperPolicy::ALL {
            let first = keeper_path(&group, policy);
            group.reverse();
            assert_eq!(keeper_path(&group, policy), first, "{policy}");
        }
    }

    #[test]
    fn test_empty_group_has_no_keeper() {
        assert!(select_keeper(&[], KeeperPolicy::Newest).is_none());
        assert!(partition(&[], KeeperPolicy::Newest).is_none());
    }

    #[test]
    fn test_partition_targets_keep_order() {
        let group = vec![rec("/c", 1, 0.0), rec("/a", 1, 0.0), rec("/b", 1, 0.0)];
        let (keeper, targets) = partition(&group, KeeperPolicy::Alphabetical).unwrap();
        assert_eq!(keeper.path, PathBuf::from("/a"));
        let targets: Vec<_> = targets.iter().map(|r| r.path.clone()).collect();
        assert_eq!(targets, vec![PathBuf::from("/c"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_parse_policy_names() {
        assert_eq!("alpha".parse::<KeeperPolicy>(), Ok(KeeperPolicy::Alphabetical));
        assert_eq!("Newest".parse::<KeeperPolicy>(), Ok(KeeperPolicy::Newest));
        assert_eq!("shortestpath".parse::<KeeperPolicy>(), Ok(KeeperPolicy::ShortestPath));
        let err = "largets".parse::<KeeperPolicy>().unwrap_err();
        assert!(err.contains("did you mean 'largest'"), "{err}");
    }

    #[test]
    fn test_policy_serde_names() {
        let p: KeeperPolicy = serde_json::from_str("\"shortest-path\"").unwrap();
        assert_eq!(p, KeeperPolicy::ShortestPath);
        let p: KeeperPolicy = serde_json::from_str("\"alpha\"").unwrap();
        assert_eq!(p, KeeperPolicy::Alphabetical);
        assert_eq!(serde_json::to_string(&KeeperPolicy::Newest).unwrap(), "\"newest\"");
    }
}
