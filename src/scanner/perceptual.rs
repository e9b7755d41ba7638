//! Perceptual image hashing for the `perceptual` fingerprint namespace.
//!
//! This module provides the `PerceptualHasher` which can compute hashes
//! for images that remain stable under common transformations like
//! resizing and re-compression. Only formats the `image` crate is built
//! with are attempted; anything else is left without a perceptual hash.

use image_hasher::{HashAlg, HasherConfig, ImageHash};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;

/// Image extensions (lowercase, with dot) the perceptual namespace is computed for.
///
/// JPEG is absent because the `jpeg` decoder feature is disabled for the
/// ARM64 build; those files still get every other namespace.
pub const IMAGE_EXTENSIONS: &[&str] = &[".png", ".webp", ".bmp", ".tif", ".tiff", ".gif"];

/// Supported perceptual hashing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PerceptualAlgorithm {
    /// pHash (Perceptual Hash) - DCT-based, most resilient to transformations.
    #[default]
    Phash,
    /// dHash (Difference Hash) - Gradient-based, very fast and effective.
    Dhash,
    /// aHash (Average Hash) - Mean-based, fast but less resilient.
    Ahash,
}

impl std::fmt::Display for PerceptualAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Phash => write!(f, "pHash"),
            Self::Dhash => write!(f, "dHash"),
            Self::Ahash => write!(f, "aHash"),
        }
    }
}

/// Errors that can occur during perceptual hashing.
#[derive(Debug, Error)]
pub enum PerceptualError {
    /// Failed to open or decode the image.
    #[error("Failed to load image {0}: {1}")]
    LoadError(String, #[source] image::ImageError),
}

/// Computes perceptual hashes for images.
pub struct PerceptualHasher {
    hasher: image_hasher::Hasher,
    algorithm: PerceptualAlgorithm,
}

impl PerceptualHasher {
    /// Create a new `PerceptualHasher` with the given algorithm.
    pub fn new(algorithm: PerceptualAlgorithm) -> Self {
        let mut config = HasherConfig::new();

        match algorithm {
            PerceptualAlgorithm::Phash => {
                config = config.hash_alg(HashAlg::Median).preproc_dct();
            }
            PerceptualAlgorithm::Dhash => {
                config = config.hash_alg(HashAlg::Gradient);
            }
            PerceptualAlgorithm::Ahash => {
                config = config.hash_alg(HashAlg::Mean);
            }
        }

        Self {
            hasher: config.to_hasher(),
            algorithm,
        }
    }

    /// Compute the perceptual hash for an image at the given path.
    pub fn compute_hash<P: AsRef<Path>>(&self, path: P) -> Result<ImageHash, PerceptualError> {
        let path = path.as_ref();
        let img = image::open(path)
            .map_err(|e| PerceptualError::LoadError(path.display().to_string(), e))?;

        Ok(self.hasher.hash_image(&img))
    }

    /// Compute the perceptual hash as lowercase hex, the form stored in records.
    pub fn compute_hex<P: AsRef<Path>>(&self, path: P) -> Result<String, PerceptualError> {
        let hash = self.compute_hash(path)?;
        let mut hex = String::with_capacity(hash.as_bytes().len() * 2);
        for byte in hash.as_bytes() {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }

    /// Get the algorithm used by this hasher.
    pub fn algorithm(&self) -> PerceptualAlgorithm {
        self.algorithm
    }
}

impl Default for PerceptualHasher {
    fn default() -> Self {
        Self::new(PerceptualAlgorithm::Phash)
    }
}

/// Check whether an extension (lowercase, with dot) is a decodable image type.
#[must_use]
pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension)
}
