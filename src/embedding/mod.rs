//! Embedding generation.
//!
//! [`SemanticEmbedder`] is the service the matcher talks to. It wraps an
//! [`Embedder`] backend (fastembed when compiled in, or an injected backend
//! such as [`HashEmbedder`]) and reports an unavailable-signal (`None`)
//! instead of erroring when no backend could be loaded.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

mod compose;
mod device;
mod fastembed;
mod hash;
mod semantic;

pub use compose::{compose_query_text, compose_rule_text, file_extension, render_value};
pub use device::Device;
pub use fastembed::FastEmbedEmbedder;
pub use hash::HashEmbedder;
pub use semantic::SemanticEmbedder;

use crate::Result;

/// Default model: fast, English-only, 384 dimensions.
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Default embedding dimensions for compact models.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Embedding dimensions for mpnet-based models.
pub const MPNET_DIMENSIONS: usize = 768;

/// Trait for embedding backends.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Known embedding model presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    /// `all-MiniLM-L6-v2`: fast, English, 384d.
    MiniLmL6V2,
    /// `all-mpnet-base-v2`: accurate, English, 768d.
    MpnetBaseV2,
    /// `paraphrase-multilingual-mpnet-base-v2`: 100+ languages, 768d.
    MultilingualMpnet,
}

impl ModelFamily {
    /// Resolves a model name or alias (`default`, `accurate`, `multilingual`).
    ///
    /// Matching is case-insensitive and ignores a `sentence-transformers/`
    /// prefix.
    #[must_use]
    pub fn resolve(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let bare = lower
            .strip_prefix("sentence-transformers/")
            .unwrap_or(&lower);
        match bare {
            "default" | "all-minilm-l6-v2" => Some(Self::MiniLmL6V2),
            "accurate" | "all-mpnet-base-v2" => Some(Self::MpnetBaseV2),
            "multilingual" | "paraphrase-multilingual-mpnet-base-v2" => {
                Some(Self::MultilingualMpnet)
            },
            _ => None,
        }
    }

    /// Returns the canonical model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        match self {
            Self::MiniLmL6V2 => DEFAULT_MODEL,
            Self::MpnetBaseV2 => "all-mpnet-base-v2",
            Self::MultilingualMpnet => "paraphrase-multilingual-mpnet-base-v2",
        }
    }

    /// Returns the output dimension.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        match self {
            Self::MiniLmL6V2 => DEFAULT_DIMENSIONS,
            Self::MpnetBaseV2 | Self::MultilingualMpnet => MPNET_DIMENSIONS,
        }
    }

    /// Returns all presets with their aliases.
    #[must_use]
    pub const fn presets() -> [(&'static str, Self); 3] {
        [
            ("default", Self::MiniLmL6V2),
            ("accurate", Self::MpnetBaseV2),
            ("multilingual", Self::MultilingualMpnet),
        ]
    }
}

/// Returns the dimension to assume for a model before it is loaded.
///
/// Known presets report their true dimension; unknown names containing
/// `mpnet` report 768, everything else 384.
#[must_use]
pub fn default_dimensions(model_name: &str) -> usize {
    ModelFamily::resolve(model_name).map_or_else(
        || {
            if model_name.to_lowercase().contains("mpnet") {
                MPNET_DIMENSIONS
            } else {
                DEFAULT_DIMENSIONS
            }
        },
        |family| family.dimensions(),
    )
}

/// Returns the canonical name for a model name or alias.
#[must_use]
pub fn canonical_model_name(model_name: &str) -> String {
    ModelFamily::resolve(model_name)
        .map_or_else(|| model_name.trim().to_string(), |f| f.model_name().to_string())
}

/// Normalizes a vector to unit L2 length in place.
///
/// Zero vectors are left unchanged.
pub fn normalize(embedding: &mut [f32]) {
    let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
    if norm_sq <= 0.0 {
        return;
    }
    let inv_norm = norm_sq.sqrt().recip();
    for v in embedding.iter_mut() {
        *v *= inv_norm;
    }
}

/// Inner product of two vectors of equal length.
///
/// Equals cosine similarity when both inputs are unit length.
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns 0.0 for mismatched lengths, empty inputs, or zero vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("default", Some(ModelFamily::MiniLmL6V2); "alias default")]
    #[test_case("all-MiniLM-L6-v2", Some(ModelFamily::MiniLmL6V2); "full name")]
    #[test_case("accurate", Some(ModelFamily::MpnetBaseV2); "alias accurate")]
    #[test_case("sentence-transformers/all-mpnet-base-v2", Some(ModelFamily::MpnetBaseV2); "prefixed")]
    #[test_case("Multilingual", Some(ModelFamily::MultilingualMpnet); "case insensitive")]
    #[test_case("bge-small-en", None; "unknown")]
    fn test_resolve_model(name: &str, expected: Option<ModelFamily>) {
        assert_eq!(ModelFamily::resolve(name), expected);
    }

    #[test_case("all-MiniLM-L6-v2", 384)]
    #[test_case("accurate", 768)]
    #[test_case("custom-mpnet-finetune", 768)]
    #[test_case("custom-model", 384)]
    fn test_default_dimensions(name: &str, expected: usize) {
        assert_eq!(default_dimensions(name), expected);
    }

    #[test]
    fn test_canonical_model_name() {
        assert_eq!(canonical_model_name("default"), "all-MiniLM-L6-v2");
        assert_eq!(canonical_model_name(" my-model "), "my-model");
    }

    #[test]
    fn test_normalize() {
        let mut v = vec![3.0, 4.0];
        normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = vec![0.0, 0.0];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_cosine_similarity_mismatched() {
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
    }
}
