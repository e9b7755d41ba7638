//! Fingerprint namespaces and the engine that computes them.
//!
//! # Overview
//!
//! A fingerprint namespace is a named hashing scheme. Values are only
//! comparable within one namespace:
//!
//! | Namespace | Field | Computed for |
//! |---|---|---|
//! | [`Namespace::Exact`] | `exact_hash` | every file (required) |
//! | [`Namespace::Perceptual`] | `perceptual_hash` | decodable images |
//! | [`Namespace::Text`] | `text_hash` | documents with extractable text |
//! | [`Namespace::Fuzzy`] | `fuzzy_hash` | any file of at least 64 bytes |
//!
//! The exact namespace failing means the file could not be read, which the
//! scanner treats as an inaccessible file. Every optional namespace that
//! fails is simply left out of the map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::document::{is_document_extension, DocumentExtractor};
use super::fuzzy::fuzzy_hash_file;
use super::hasher::{hash_to_hex, Hasher};
use super::perceptual::{is_image_extension, PerceptualAlgorithm, PerceptualHasher};
use super::HashError;

/// A named fingerprinting scheme.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// BLAKE3 of the full content.
    #[default]
    Exact,
    /// pHash of the decoded image.
    Perceptual,
    /// SHA-256 of normalized extracted text.
    Text,
    /// SimHash of byte shingles.
    Fuzzy,
}

impl Namespace {
    /// Every namespace, in field order.
    pub const ALL: [Namespace; 4] = [
        Namespace::Exact,
        Namespace::Perceptual,
        Namespace::Text,
        Namespace::Fuzzy,
    ];

    /// Short name used in configuration and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Perceptual => "perceptual",
            Self::Text => "text",
            Self::Fuzzy => "fuzzy",
        }
    }

    /// Name of the JSON field that carries this namespace's value.
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Exact => "exact_hash",
            Self::Perceptual => "perceptual_hash",
            Self::Text => "text_hash",
            Self::Fuzzy => "fuzzy_hash",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == lowered)
            .ok_or_else(|| {
                let names: Vec<&str> = Namespace::ALL.iter().map(|ns| ns.as_str()).collect();
                unknown_name_message("namespace", &lowered, &names)
            })
    }
}

/// Build an "unknown X" message with a close-match hint when one exists.
pub(crate) fn unknown_name_message(kind: &str, given: &str, known: &[&str]) -> String {
    let closest = known
        .iter()
        .map(|name| (strsim::jaro_winkler(given, name), *name))
        .filter(|(score, _)| *score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0));
    match closest {
        Some((_, name)) => format!("unknown {kind} '{given}', did you mean '{name}'?"),
        None => format!("unknown {kind} '{given}' (expected one of: {})", known.join(", ")),
    }
}

/// Namespace to fingerprint value, ordered by namespace.
pub type Fingerprints = BTreeMap<Namespace, String>;

/// Computes fingerprints for one file at a time.
pub struct FingerprintEngine {
    hasher: Hasher,
    perceptual: PerceptualHasher,
}

impl Default for FingerprintEngine {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::default())
    }
}

impl FingerprintEngine {
    /// Create an engine using the given perceptual algorithm.
    #[must_use]
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        Self {
            hasher: Hasher::new(),
            perceptual: PerceptualHasher::new(algorithm),
        }
    }

    /// Compute every namespace in `namespaces` for one file.
    ///
    /// `extension` is the record's lowercase, dotted extension and decides
    /// which optional namespaces apply.
    ///
    /// # Errors
    ///
    /// Only a failure of the exact namespace is returned; optional
    /// namespaces that fail are omitted from the result.
    pub fn compute(
        &self,
        path: &Path,
        extension: &str,
        namespaces: &BTreeSet<Namespace>,
    ) -> Result<Fingerprints, HashError> {
        let mut fingerprints = Fingerprints::new();
        for &namespace in namespaces {
            if namespace == Namespace::Exact {
                let hash = self.hasher.full_hash(path)?;
                fingerprints.insert(Namespace::Exact, hash_to_hex(&hash));
            } else if let Some(value) = self.compute_optional(path, extension, namespace) {
                fingerprints.insert(namespace, value);
            }
        }
        Ok(fingerprints)
    }

    /// Compute one optional namespace, `None` when it does not apply or fails.
    #[must_use]
    pub fn compute_optional(
        &self,
        path: &Path,
        extension: &str,
        namespace: Namespace,
    ) -> Option<String> {
        let result = match namespace {
            Namespace::Exact => self
                .hasher
                .full_hash(path)
                .map(|h| Some(hash_to_hex(&h)))
                .map_err(|e| e.to_string()),
            Namespace::Perceptual => {
                if !is_image_extension(extension) {
                    return None;
                }
                self.perceptual
                    .compute_hex(path)
                    .map(Some)
                    .map_err(|e| e.to_string())
            }
            Namespace::Text => {
                if !is_document_extension(extension) {
                    return None;
                }
                DocumentExtractor::text_fingerprint(path).map_err(|e| e.to_string())
            }
            Namespace::Fuzzy => fuzzy_hash_file(path).map_err(|e| e.to_string()),
        };

        match result {
            Ok(value) => value,
            Err(message) => {
                log::debug!(
                    "No {} fingerprint for {}: {}",
                    namespace,
                    path.display(),
                    message
                );
                None
            }
        }
    }
}
