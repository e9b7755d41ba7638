//! Turning duplicate groups into planned mutations.
//!
//! For each group the keeper is chosen by policy and every other member
//! becomes a target:
//!
//! | link mode  | target becomes                                 | logged as                       |
//! |------------|------------------------------------------------|---------------------------------|
//! | `move`     | `quarantine/<name>` (or the mirrored path)     | `{src: target, dst: quarantine}`|
//! | `hardlink` | a hard link to the keeper, at its own path     | `{src: target, dst: keeper}`    |
//! | `copy`     | a fresh copy of the keeper, at its own path    | `{src: target, dst: keeper}`    |
//!
//! `hardlink` and `copy` overwrite the target with the keeper's bytes, so
//! they are only allowed for `exact` groups. Members of a `perceptual`,
//! `text` or `fuzzy` group merely look alike and can only be moved.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::mutate::{FileSnapshot, PlannedMutation};
use super::oplog::MutationKind;
use crate::duplicates::{partition, DuplicateGroup, KeeperPolicy};
use crate::scanner::path_utils::strip_root;
use crate::scanner::patterns::PatternSet;
use crate::scanner::{FileRecord, Namespace};

/// Link mode for non-keeper duplicates.
pub type LinkMode = MutationKind;

/// Options for one dedupe run.
#[derive(Debug, Clone)]
pub struct DedupeOptions {
    /// Namespace whose groups are resolved
    pub namespace: Namespace,
    /// Keeper policy
    pub policy: KeeperPolicy,
    /// What happens to non-keepers
    pub link_mode: LinkMode,
    /// Destination root for `move`
    pub quarantine: Option<PathBuf>,
    /// Mirror the full source path under the quarantine root
    pub preserve_tree: bool,
    /// Targets matching these globs are left alone (gitignore syntax,
    /// matched against the absolute path)
    pub ignore_globs: Vec<String>,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            namespace: Namespace::Exact,
            policy: KeeperPolicy::default(),
            link_mode: MutationKind::Move,
            quarantine: None,
            preserve_tree: false,
            ignore_globs: Vec::new(),
        }
    }
}

/// Mutations derived from a set of groups.
#[derive(Debug, Clone, Default)]
pub struct DedupePlan {
    /// Work for the mutation engine
    pub mutations: Vec<PlannedMutation>,
    /// Keeper of every group, in group order
    pub keepers: Vec<PathBuf>,
    /// Groups considered
    pub groups: usize,
    /// Targets left alone because of `ignore_globs`
    pub ignored: usize,
}

/// Invalid dedupe options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// `move` needs somewhere to move to.
    #[error("link mode 'move' requires a quarantine directory")]
    MissingQuarantine,

    /// Replacing content is only lossless when group members are identical.
    #[error(
        "link mode '{link_mode}' would overwrite files that only match in the \
         '{namespace}' namespace; use 'move' or the 'exact' namespace"
    )]
    LossyLinkMode {
        /// Namespace of the groups being resolved
        namespace: Namespace,
        /// Requested link mode
        link_mode: LinkMode,
    },
}

/// Where `path` goes under `quarantine`.
#[must_use]
pub fn quarantine_destination(quarantine: &Path, path: &Path, preserve_tree: bool) -> PathBuf {
    if preserve_tree {
        quarantine.join(strip_root(path))
    } else {
        quarantine.join(path.file_name().unwrap_or(path.as_os_str()))
    }
}

/// Plan the resolution of `groups`.
///
/// Groups of another namespace than `options.namespace` are ignored.
///
/// # Errors
///
/// Returns [`PlanError::MissingQuarantine`] for `move` without a quarantine
/// and [`PlanError::LossyLinkMode`] for `hardlink`/`copy` outside the `exact`
/// namespace.
pub fn plan_dedupe(
    groups: &[DuplicateGroup],
    options: &DedupeOptions,
) -> Result<DedupePlan, PlanError> {
    if options.link_mode != MutationKind::Move && options.namespace != Namespace::Exact {
        return Err(PlanError::LossyLinkMode {
            namespace: options.namespace,
            link_mode: options.link_mode,
        });
    }
    let quarantine = match (options.link_mode, &options.quarantine) {
        (MutationKind::Move, None) => return Err(PlanError::MissingQuarantine),
        (_, q) => q.as_deref(),
    };
    let ignore = PatternSet::new(Path::new("/"), &options.ignore_globs);

    let mut plan = DedupePlan::default();
    for group in groups.iter().filter(|g| g.namespace == options.namespace) {
        let Some((keeper, targets)) = partition(&group.files, options.policy) else {
            continue;
        };
        plan.groups += 1;
        plan.keepers.push(keeper.path.clone());

        for target in targets {
            if ignore.is_match(&target.path, false) {
                log::debug!("Ignoring {} (matches ignore glob)", target.path.display());
                plan.ignored += 1;
                continue;
            }
            plan.mutations
                .push(plan_target(target, keeper, options.link_mode, quarantine, options.preserve_tree));
        }
    }

    log::info!(
        "Planned {} {} mutation(s) across {} group(s), keeper policy {}",
        plan.mutations.len(),
        options.link_mode,
        plan.groups,
        options.policy
    );
    Ok(plan)
}

fn plan_target(
    target: &FileRecord,
    keeper: &FileRecord,
    mode: LinkMode,
    quarantine: Option<&Path>,
    preserve_tree: bool,
) -> PlannedMutation {
    let planned = match (mode, quarantine) {
        (MutationKind::Move, Some(q)) => PlannedMutation::relocate(
            target.path.clone(),
            quarantine_destination(q, &target.path, preserve_tree),
        ),
        (MutationKind::Hardlink, _) => PlannedMutation::link(target.path.clone(), keeper.path.clone()),
        _ => PlannedMutation::copy(target.path.clone(), keeper.path.clone()),
    };
    planned.with_expected(FileSnapshot::from_record(target))
}
