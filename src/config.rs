//! Layered application configuration.
//!
//! Values are merged with `figment`, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, else `config.toml` in the platform
//!    config directory when it exists)
//! 3. `DRIVETIDY_*` environment variables, `__` separating nested keys
//!    (`DRIVETIDY_DEDUPE__POLICY=newest`)
//!
//! Library code never reads configuration. The application layer turns an
//! [`AppConfig`] into [`ScanOptions`], [`DedupeOptions`] and the other
//! explicit option types before calling into the core.
//!
//! ```toml
//! cache_path = "/var/cache/drivetidy.sqlite3"
//! undo_log = "/var/log/drivetidy/undo.jsonl"
//!
//! [scan]
//! skip_globs = [".git/", "node_modules/"]
//! namespaces = ["perceptual"]
//!
//! [dedupe]
//! policy = "newest"
//! link_mode = "hardlink"
//!
//! [organize.by_extension]
//! ".heic" = "Photos"
//!
//! [[tag_rules]]
//! name = "receipts"
//! include = ["**/receipt*"]
//! tags = ["finance"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::mutate::{ConflictPolicy, HardlinkFallback, MutationConfig};
use crate::actions::organize::{CameraOverride, CategoryOverrides, GlobOverride, OrganizeOptions};
use crate::actions::tags::{TagOptions, TagRule};
use crate::actions::{DedupeOptions, MutationKind};
use crate::duplicates::KeeperPolicy;
use crate::scanner::{Namespace, PerceptualAlgorithm, ScanOptions, DEFAULT_LARGE_FILE_THRESHOLD};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "DRIVETIDY_";

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file named with `--config` does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// A layer could not be parsed or has the wrong shape.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// `[scan]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Minimum file size in bytes
    pub min_size: Option<u64>,
    /// Maximum file size in bytes
    pub max_size: Option<u64>,
    /// Extensions to skip
    pub skip_extensions: Vec<String>,
    /// Gitignore-style exclusions relative to the scan root
    pub skip_globs: Vec<String>,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Files above this many bytes are not fingerprinted
    pub large_file_threshold: u64,
    /// Fingerprint every file regardless of size
    pub hash_large_files: bool,
    /// Optional namespaces in addition to `exact`
    pub namespaces: Vec<Namespace>,
    /// Perceptual hash algorithm
    pub perceptual_algorithm: PerceptualAlgorithm,
    /// Stop after this many files
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_size: None,
            max_size: None,
            skip_extensions: Vec::new(),
            skip_globs: Vec::new(),
            follow_symlinks: false,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            hash_large_files: false,
            namespaces: Vec::new(),
            perceptual_algorithm: PerceptualAlgorithm::default(),
            max_files: None,
        }
    }
}

impl ScanConfig {
    /// Scanner options for this section.
    #[must_use]
    pub fn to_scan_options(&self) -> ScanOptions {
        let threshold = (!self.hash_large_files).then_some(self.large_file_threshold);
        let mut options = ScanOptions::default()
            .with_min_size(self.min_size)
            .with_max_size(self.max_size)
            .with_skip_extensions(self.skip_extensions.clone())
            .with_skip_globs(self.skip_globs.clone())
            .with_follow_symlinks(self.follow_symlinks)
            .with_large_file_threshold(threshold)
            .with_max_files(self.max_files);
        options.perceptual_algorithm = self.perceptual_algorithm;
        for namespace in &self.namespaces {
            options = options.with_namespace(*namespace);
        }
        options
    }
}

/// `[dedupe]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupeConfig {
    /// Namespace whose groups are resolved
    pub namespace: Namespace,
    /// Keeper policy
    pub policy: KeeperPolicy,
    /// `move`, `hardlink` or `copy`
    pub link_mode: MutationKind,
    /// Quarantine root for `move`
    pub quarantine: Option<PathBuf>,
    /// Mirror full paths under the quarantine
    pub preserve_tree: bool,
    /// Duplicates matching these globs are never touched
    pub ignore_globs: Vec<String>,
    /// Destination conflicts
    pub conflict: ConflictPolicy,
    /// Cross-device hard links
    pub hardlink_fallback: HardlinkFallback,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::Exact,
            policy: KeeperPolicy::default(),
            link_mode: MutationKind::Move,
            quarantine: None,
            preserve_tree: false,
            ignore_globs: Vec::new(),
            conflict: ConflictPolicy::Fail,
            hardlink_fallback: HardlinkFallback::Skip,
        }
    }
}

impl DedupeConfig {
    /// Planning options for this section.
    #[must_use]
    pub fn to_dedupe_options(&self) -> DedupeOptions {
        DedupeOptions {
            namespace: self.namespace,
            policy: self.policy,
            link_mode: self.link_mode,
            quarantine: self.quarantine.clone(),
            preserve_tree: self.preserve_tree,
            ignore_globs: self.ignore_globs.clone(),
        }
    }

    /// Engine settings for this section.
    #[must_use]
    pub fn to_mutation_config(&self, dry_run: bool) -> MutationConfig {
        MutationConfig::default()
            .with_dry_run(dry_run)
            .with_conflict(self.conflict)
            .with_hardlink_fallback(self.hardlink_fallback)
    }
}

/// `[organize]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeConfig {
    /// Keep paths relative to the source under each category
    pub preserve_tree: bool,
    /// Gitignore-style exclusions relative to the source
    pub skip_globs: Vec<String>,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Rename instead of failing on destination conflicts
    pub conflict: ConflictPolicy,
    /// Glob routes, checked first
    pub by_glob: Vec<GlobOverride>,
    /// Camera routes, checked second
    pub by_exif_camera: Vec<CameraOverride>,
    /// Extension routes, checked third
    pub by_extension: BTreeMap<String, String>,
}

impl OrganizeConfig {
    /// Routing overrides for this section.
    #[must_use]
    pub fn overrides(&self) -> CategoryOverrides {
        CategoryOverrides {
            by_glob: self.by_glob.clone(),
            by_exif_camera: self.by_exif_camera.clone(),
            by_extension: self.by_extension.clone(),
        }
    }

    /// Walk options for this section.
    #[must_use]
    pub fn to_organize_options(&self) -> OrganizeOptions {
        OrganizeOptions {
            preserve_tree: self.preserve_tree,
            skip_globs: self.skip_globs.clone(),
            follow_symlinks: self.follow_symlinks,
        }
    }

    /// Walk options for tagging, sharing this section's exclusions.
    #[must_use]
    pub fn to_tag_options(&self) -> TagOptions {
        TagOptions {
            skip_globs: self.skip_globs.clone(),
            follow_symlinks: self.follow_symlinks,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Fingerprint cache database; platform cache dir when unset
    pub cache_path: Option<PathBuf>,
    /// Operation log; platform data dir when unset
    pub undo_log: Option<PathBuf>,
    /// Scanner settings
    pub scan: ScanConfig,
    /// Dedupe settings
    pub dedupe: DedupeConfig,
    /// Organize settings
    pub organize: OrganizeConfig,
    /// Tagging rules
    pub tag_rules: Vec<TagRule>,
}

impl AppConfig {
    /// Load every layer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `explicit` names a missing file and
    /// [`ConfigError::Invalid`] if any layer fails to parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) if !path.is_file() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };
        let config = Self::figment(file.as_deref())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;
        log::debug!("Configuration loaded (file: {:?})", file);
        Ok(config)
    }

    /// Defaults merged with an optional TOML file, without the environment layer.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        match file {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        }
    }

    /// Configured cache path, else `cache.sqlite3` in the platform cache directory.
    #[must_use]
    pub fn resolved_cache_path(&self) -> Option<PathBuf> {
        self.cache_path.clone().or_else(|| {
            project_dirs().map(|dirs| dirs.cache_dir().join("cache.sqlite3"))
        })
    }

    /// Configured log path, else `undo.jsonl` in the platform data directory.
    #[must_use]
    pub fn resolved_undo_log(&self) -> Option<PathBuf> {
        self.undo_log
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join("undo.jsonl")))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if a value has no TOML representation.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "drivetidy", "drivetidy")
}

fn default_config_file() -> Option<PathBuf> {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .filter(|path| path.is_file())
}
