//! Command-line interface definitions for drivetidy.
//!
//! Global options (verbosity, color, config file, error format) come first,
//! then one subcommand per operation. Options left unset fall back to the
//! configuration file.
//!
//! # Example
//!
//! ```bash
//! # Inventory a drive, with perceptual hashes for images
//! drivetidy scan /mnt/photos --namespace perceptual -o photos.jsonl
//!
//! # Quarantine exact duplicates, keeping the newest copy
//! drivetidy dedupe photos.jsonl --policy newest --quarantine /mnt/quarantine
//!
//! # Put everything back
//! drivetidy undo
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::actions::MutationKind;
use crate::duplicates::KeeperPolicy;
use crate::scanner::Namespace;

/// Drive inventory, duplicate cleanup and reversible file organization.
///
/// Every change drivetidy makes is recorded in an operation log and can be
/// reversed with `drivetidy undo`.
#[derive(Debug, Parser)]
#[command(name = "drivetidy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH", env = "DRIVETIDY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk a directory and write one JSON record per file
    Scan(ScanArgs),
    /// Resolve duplicates from a scan report
    Dedupe(DedupeArgs),
    /// Move files into category folders
    Organize(OrganizeArgs),
    /// Tag files by the configured rules
    Tag(TagArgs),
    /// Move files carrying all given tags
    MoveByTags(MoveByTagsArgs),
    /// Reverse an operation log
    Undo(UndoArgs),
    /// Inspect or clear the fingerprint cache
    Cache(CacheArgs),
    /// Show the effective configuration
    Config,
}

/// Options shared by every command that mutates files.
#[derive(Debug, Clone, Default, Args)]
pub struct MutationArgs {
    /// Report what would change without touching anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Operation log to append to
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Rename instead of failing when a destination exists
    #[arg(long)]
    pub rename_conflicts: bool,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Write records here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Extensions to skip (can be specified multiple times)
    #[arg(long = "skip-ext", value_name = "EXT")]
    pub skip_extensions: Vec<String>,

    /// Gitignore-style patterns to skip, relative to PATH
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during scan
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Extra fingerprint namespaces (perceptual, text, fuzzy)
    #[arg(long = "namespace", value_name = "NAME")]
    pub namespaces: Vec<Namespace>,

    /// Fingerprint files of any size
    #[arg(long)]
    pub hash_large_files: bool,

    /// Stop after this many files
    #[arg(long, value_name = "N")]
    pub max_files: Option<usize>,

    /// Fingerprint cache database
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Disable the fingerprint cache
    #[arg(long, conflicts_with = "cache")]
    pub no_cache: bool,
}

/// Arguments for the dedupe subcommand.
#[derive(Debug, Args)]
pub struct DedupeArgs {
    /// Scan report (JSON-Lines)
    #[arg(value_name = "REPORT")]
    pub report: PathBuf,

    /// Namespace to group by
    #[arg(long, value_name = "NAME")]
    pub namespace: Option<Namespace>,

    /// Which file of a group is kept (newest, largest, alphabetical, shortest-path)
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<KeeperPolicy>,

    /// What happens to the other files (move, hardlink, copy)
    #[arg(long, value_name = "MODE")]
    pub link_mode: Option<MutationKind>,

    /// Destination for moved duplicates
    #[arg(long, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Mirror full paths under the quarantine
    #[arg(long)]
    pub preserve_tree: bool,

    /// Never touch duplicates matching these patterns
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Copy when a hard link would cross devices
    #[arg(long)]
    pub copy_fallback: bool,

    /// Also write the groups as CSV
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Shared mutation options
    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Arguments for the organize subcommand.
#[derive(Debug, Args)]
pub struct OrganizeArgs {
    /// Directory to organize
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Root of the category folders
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Keep paths relative to SOURCE under each category
    #[arg(long)]
    pub preserve_tree: bool,

    /// Gitignore-style patterns to skip, relative to SOURCE
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Shared mutation options
    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Arguments for the tag subcommand.
#[derive(Debug, Args)]
pub struct TagArgs {
    /// Directory to tag
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Write tag records here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the move-by-tags subcommand.
#[derive(Debug, Args)]
pub struct MoveByTagsArgs {
    /// Tag file (JSON-Lines)
    #[arg(value_name = "TAGS")]
    pub tags_file: PathBuf,

    /// Destination directory
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Required tag (can be specified multiple times)
    #[arg(short, long = "tag", value_name = "TAG", required = true)]
    pub tags: Vec<String>,

    /// Leave files matching these patterns alone
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Shared mutation options
    #[command(flatten)]
    pub mutation: MutationArgs,
}

/// Arguments for the undo subcommand.
#[derive(Debug, Args)]
pub struct UndoArgs {
    /// Operation log to reverse (defaults to the configured log)
    #[arg(value_name = "LOG")]
    pub log: Option<PathBuf>,

    /// Directory of backups for files missing from their logged location
    #[arg(long, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Report without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Cache database (defaults to the configured cache)
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Cache operation
    #[command(subcommand)]
    pub command: CacheCommand,
}

/// Cache operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheCommand {
    /// Print the number of cached entries
    Stats,
    /// Remove every entry
    Clear,
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use drivetidy::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("Size cannot be negative".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
