//! Organization of a tree into category folders.
//!
//! Each file is routed to a folder by the first matching [`RouteRule`]:
//! glob overrides, then EXIF camera overrides (images only), then extension
//! overrides, then the built-in category table. The resulting moves go
//! through the mutation engine like any other batch; callers usually run
//! them with [`ConflictPolicy::Rename`](super::mutate::ConflictPolicy::Rename)
//! so a name clash gets a content-hash suffix instead of failing.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::mutate::{FileSnapshot, PlannedMutation};
use crate::scanner::path_utils::{absolute_path, relative_key};
use crate::scanner::patterns::PatternSet;
use crate::scanner::walker::{handle_io_error, Walker};
use crate::scanner::{extension_of, normalize_extension, ScanError};

/// Folder for extensions not in any category.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Built-in categories and their extensions.
pub const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Images",
        &[
            ".jpg", ".jpeg", ".png", ".webp", ".gif", ".bmp", ".tif", ".tiff", ".heic", ".psd",
            ".ai", ".svg", ".raw", ".cr2", ".nef", ".arw",
        ],
    ),
    (
        "Videos",
        &[
            ".mp4", ".mov", ".mkv", ".avi", ".wmv", ".flv", ".webm", ".mts", ".m2ts", ".m4v",
            ".3gp",
        ],
    ),
    (
        "Audio",
        &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma", ".aiff"],
    ),
    (
        "Documents",
        &[".txt", ".rtf", ".md", ".doc", ".docx", ".odt", ".pdf"],
    ),
    ("Spreadsheets", &[".xls", ".xlsx", ".csv", ".ods"]),
    ("Presentations", &[".ppt", ".pptx", ".key", ".odp"]),
    (
        "Archives",
        &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz", ".iso"],
    ),
    (
        "Code",
        &[
            ".py", ".js", ".ts", ".tsx", ".jsx", ".java", ".c", ".cpp", ".cs", ".go", ".rb",
            ".php", ".sh", ".ps1", ".bat", ".json", ".yaml", ".yml", ".toml", ".ini", ".sql",
        ],
    ),
    ("Design", &[".indd", ".idml", ".sketch", ".fig", ".xd"]),
    ("Fonts", &[".ttf", ".otf", ".woff", ".woff2"]),
    (
        "CAD_3D",
        &[
            ".dwg", ".dxf", ".step", ".stp", ".iges", ".igs", ".obj", ".stl", ".fbx", ".rvt",
            ".rfa",
        ],
    ),
    ("Disk_Images", &[".dmg", ".vhd", ".vhdx", ".vmdk"]),
    (
        "Installers",
        &[".msi", ".exe", ".pkg", ".deb", ".rpm", ".apk"],
    ),
    ("System_Logs", &[".log", ".evtx", ".dmp"]),
];

/// Category folder for a dotted, lowercase extension.
#[must_use]
pub fn guess_category(extension: &str) -> &'static str {
    CATEGORIES
        .iter()
        .find(|(_, exts)| exts.contains(&extension))
        .map_or(FALLBACK_CATEGORY, |(name, _)| *name)
}

fn is_image(extension: &str) -> bool {
    guess_category(extension) == "Images"
}

/// Glob override entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobOverride {
    /// Gitignore-style pattern relative to the source root
    pub pattern: String,
    /// Folder under the destination
    pub target: String,
}

/// Camera override entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraOverride {
    /// Case-insensitive substring of the EXIF `Model` tag
    pub model: String,
    /// Folder under the destination; `{camera}` expands to the model
    pub target: String,
}

/// Already-parsed category overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryOverrides {
    /// Checked first, in order
    pub by_glob: Vec<GlobOverride>,
    /// Checked second, in order, for image files with a camera model
    pub by_exif_camera: Vec<CameraOverride>,
    /// Checked third; keys are extensions with or without the dot
    pub by_extension: BTreeMap<String, String>,
}

/// One routing rule.
#[derive(Debug, Clone)]
pub enum RouteRule {
    /// Files matching the patterns go to `target`.
    Glob {
        /// Compiled pattern
        patterns: PatternSet,
        /// Destination folder
        target: String,
    },
    /// Images whose camera model contains `model` go to `target`.
    Camera {
        /// Lowercased model substring
        model: String,
        /// Destination folder template
        target: String,
    },
    /// Files with this extension go to `target`.
    Extension {
        /// Dotted lowercase extension
        extension: String,
        /// Destination folder
        target: String,
    },
}

/// First-match-wins router over [`RouteRule`]s.
#[derive(Debug, Clone, Default)]
pub struct CategoryRouter {
    rules: Vec<RouteRule>,
}

impl CategoryRouter {
    /// Router with explicit rules; unmatched files use the category table.
    #[must_use]
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// Router from config overrides, with globs relative to `source_root`.
    #[must_use]
    pub fn from_overrides(overrides: &CategoryOverrides, source_root: &Path) -> Self {
        let globs = overrides.by_glob.iter().map(|o| RouteRule::Glob {
            patterns: PatternSet::new(source_root, &[o.pattern.as_str()]),
            target: o.target.clone(),
        });
        let cameras = overrides.by_exif_camera.iter().map(|o| RouteRule::Camera {
            model: o.model.to_lowercase(),
            target: o.target.clone(),
        });
        let extensions = overrides.by_extension.iter().map(|(ext, target)| RouteRule::Extension {
            extension: normalize_extension(ext),
            target: target.clone(),
        });
        Self::new(globs.chain(cameras).chain(extensions).collect())
    }

    /// Rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Folder (relative to the destination) for `path`.
    #[must_use]
    pub fn route(&self, path: &Path) -> PathBuf {
        let extension = extension_of(path);
        let mut camera: Option<Option<String>> = None;

        for rule in &self.rules {
            match rule {
                RouteRule::Glob { patterns, target } => {
                    if patterns.is_match(path, false) {
                        return target_path(target);
                    }
                }
                RouteRule::Camera { model, target } => {
                    if !is_image(&extension) {
                        continue;
                    }
                    let found = camera.get_or_insert_with(|| camera_model(path));
                    if let Some(found) = found {
                        if found.to_lowercase().contains(model.as_str()) {
                            let safe = found.replace(['/', '\\'], "_");
                            return target_path(&target.replace("{camera}", &safe));
                        }
                    }
                }
                RouteRule::Extension {
                    extension: ext,
                    target,
                } => {
                    if *ext == extension {
                        return target_path(target);
                    }
                }
            }
        }
        PathBuf::from(guess_category(&extension))
    }
}

fn target_path(target: &str) -> PathBuf {
    PathBuf::from(target.replace('\\', "/").trim_start_matches('/'))
}

/// EXIF `Model` tag of an image, if it has one.
#[must_use]
pub fn camera_model(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            log::trace!("No EXIF in {}: {}", path.display(), e);
            return None;
        }
    };
    let field = exif.get_field(exif::Tag::Model, exif::In::PRIMARY)?;
    let model = match &field.value {
        exif::Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())?,
        _ => field.display_value().to_string(),
    };
    (!model.is_empty()).then_some(model)
}

/// Options for [`plan_organize`].
#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    /// Keep the path relative to the source under the category folder
    pub preserve_tree: bool,
    /// Files and directories to leave alone (gitignore syntax)
    pub skip_globs: Vec<String>,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
}

/// Moves derived from a walk.
#[derive(Debug, Clone, Default)]
pub struct OrganizePlan {
    /// One move per routed file
    pub mutations: Vec<PlannedMutation>,
    /// Entries the walk could not read
    pub skipped: Vec<(PathBuf, String)>,
}

/// Plan moving every file under `source` to `dest/<route>/<name or relative path>`.
///
/// A destination inside the source is not walked. Files already at their
/// destination are left out.
///
/// # Errors
///
/// Fails only if `source` is missing or not a directory.
pub fn plan_organize(
    source: &Path,
    dest: &Path,
    router: &CategoryRouter,
    options: &OrganizeOptions,
) -> Result<OrganizePlan, ScanError> {
    let source = absolute_path(source).map_err(|e| handle_io_error(source, e))?;
    let dest = absolute_path(dest).map_err(|e| handle_io_error(dest, e))?;
    let metadata = std::fs::metadata(&source).map_err(|e| handle_io_error(&source, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(source));
    }

    let walker = Walker::new(&source, &options.skip_globs, options.follow_symlinks)
        .with_pruned_dir(dest.clone());

    let mut plan = OrganizePlan::default();
    for item in walker {
        let path = match item {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Skipping: {}", e);
                plan.skipped.push((e.path().map(Path::to_path_buf).unwrap_or_default(), e.to_string()));
                continue;
            }
        };

        let snapshot = match FileSnapshot::capture(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                plan.skipped.push((path, e.to_string()));
                continue;
            }
        };

        let tail = if options.preserve_tree {
            PathBuf::from(relative_key(&source, &path))
        } else {
            match path.file_name() {
                Some(name) => PathBuf::from(name),
                None => continue,
            }
        };
        let destination = dest.join(router.route(&path)).join(tail);
        if destination == path {
            log::trace!("Already organized: {}", path.display());
            continue;
        }
        plan.mutations
            .push(PlannedMutation::relocate(path, destination).with_expected(snapshot));
    }

    log::info!(
        "Planned {} move(s) from {} into {}",
        plan.mutations.len(),
        source.display(),
        dest.display()
    );
    Ok(plan)
}
