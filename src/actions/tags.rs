//! Rule-based tagging and moving files by tag.
//!
//! A [`TagRule`] gives its tags to every file that matches at least one
//! include glob and no exclude glob (gitignore syntax, relative to the
//! tagged root). Tag files are JSON-Lines of `{path, tags, rel?, timestamp?}`;
//! only `path` and `tags` are required when reading, so tag files produced
//! by other tools work unchanged.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::mutate::PlannedMutation;
use crate::output::jsonl::{read_json_lines, JsonLinesError, JsonLinesWriter};
use crate::scanner::path_utils::{absolute_path, relative_key};
use crate::scanner::patterns::PatternSet;
use crate::scanner::walker::{handle_io_error, Walker};
use crate::scanner::ScanError;

/// One tagging rule, as loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRule {
    /// Rule name (for logs)
    pub name: String,
    /// A file must match one of these
    pub include: Vec<String>,
    /// and none of these
    pub exclude: Vec<String>,
    /// Tags given to matching files
    pub tags: Vec<String>,
}

/// Tags attached to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the tagged root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel: Option<String>,
    /// Sorted, unique tags
    pub tags: Vec<String>,
    /// When the file was tagged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

struct CompiledRule {
    name: String,
    include: PatternSet,
    exclude: PatternSet,
    tags: Vec<String>,
}

/// Rules compiled against one root.
pub struct Tagger {
    rules: Vec<CompiledRule>,
}

impl Tagger {
    /// Compile `rules` for files under `root`.
    #[must_use]
    pub fn new(rules: &[TagRule], root: &Path) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                name: rule.name.clone(),
                include: PatternSet::new(root, &rule.include),
                exclude: PatternSet::new(root, &rule.exclude),
                tags: rule
                    .tags
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    /// Sorted tags for `path` (empty when no rule applies).
    #[must_use]
    pub fn tags_for(&self, path: &Path) -> Vec<String> {
        let mut tags = BTreeSet::new();
        for rule in &self.rules {
            if rule.include.is_match(path, false) && !rule.exclude.is_match(path, false) {
                log::trace!("Rule '{}' tags {}", rule.name, path.display());
                tags.extend(rule.tags.iter().cloned());
            }
        }
        tags.into_iter().collect()
    }
}

/// Options for [`tag_tree`].
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Files and directories to leave untagged
    pub skip_globs: Vec<String>,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
}

/// Tag every file under `root`; files without tags are left out.
///
/// # Errors
///
/// Fails only if `root` is missing or not a directory. Unreadable entries are
/// warned about and skipped.
pub fn tag_tree(root: &Path, rules: &[TagRule], options: &TagOptions) -> Result<Vec<TagRecord>, ScanError> {
    let root = absolute_path(root).map_err(|e| handle_io_error(root, e))?;
    let metadata = fs::metadata(&root).map_err(|e| handle_io_error(&root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root));
    }

    let tagger = Tagger::new(rules, &root);
    let now = Utc::now();
    let mut records = Vec::new();

    for item in Walker::new(&root, &options.skip_globs, options.follow_symlinks) {
        let path = match item {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Skipping: {}", e);
                continue;
            }
        };
        let tags = tagger.tags_for(&path);
        if tags.is_empty() {
            continue;
        }
        records.push(TagRecord {
            rel: Some(relative_key(&root, &path)),
            path,
            tags,
            timestamp: Some(now),
        });
    }

    log::info!("Tagged {} file(s) under {}", records.len(), root.display());
    Ok(records)
}

/// Write tag records to `path`, replacing it.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_tags(path: &Path, records: &[TagRecord]) -> Result<(), JsonLinesError> {
    let io_err = |source| JsonLinesError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let file = File::create(path).map_err(io_err)?;
    let mut writer = JsonLinesWriter::new(BufWriter::new(file));
    for record in records {
        writer.write(record)?;
    }
    writer.finish()?;
    Ok(())
}

/// Read a tag file.
///
/// # Errors
///
/// Returns an error naming the first malformed line.
pub fn read_tags(path: &Path) -> Result<Vec<TagRecord>, JsonLinesError> {
    read_json_lines(path)
}

/// Plan moving every record carrying all `required` tags to `dest/<file name>`.
///
/// Records whose path matches `ignore_globs` (matched against the absolute
/// path) are left alone.
#[must_use]
pub fn plan_move_by_tags<S: AsRef<str>>(
    records: &[TagRecord],
    dest: &Path,
    required: &[S],
    ignore_globs: &[String],
) -> Vec<PlannedMutation> {
    let wanted: BTreeSet<&str> = required
        .iter()
        .map(|t| t.as_ref().trim())
        .filter(|t| !t.is_empty())
        .collect();
    let ignore = PatternSet::new(Path::new("/"), ignore_globs);

    let plan: Vec<PlannedMutation> = records
        .iter()
        .filter(|record| !ignore.is_match(&record.path, false))
        .filter(|record| {
            let have: BTreeSet<&str> = record.tags.iter().map(String::as_str).collect();
            wanted.is_subset(&have)
        })
        .filter_map(|record| {
            let name = record.path.file_name()?;
            Some(PlannedMutation::relocate(record.path.clone(), dest.join(name)))
        })
        .collect();

    log::info!(
        "{} file(s) carry tags [{}]",
        plan.len(),
        wanted.into_iter().collect::<Vec<_>>().join(", ")
    );
    plan
}
