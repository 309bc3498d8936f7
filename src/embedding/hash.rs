//! Hash-based pseudo-embeddings.

use super::{DEFAULT_DIMENSIONS, Embedder, normalize};
use crate::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Limit word iteration to bound computation time on very long texts.
const MAX_WORDS: usize = 1000;

/// Embedder producing deterministic hash-based vectors.
///
/// Vectors depend only on the lowercased words of the input, so identical
/// texts embed identically and texts sharing words land close together. They
/// do NOT capture meaning: "file missing" and "path not found" are unrelated.
/// Useful for offline runs, tests and benchmarks; never selected
/// automatically.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a hash embedder with the default dimension (384).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a hash embedder with custom dimensions.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn pseudo_embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text.split_whitespace().take(MAX_WORDS) {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            Self::distribute_hash(&mut embedding, hasher.finish());
        }

        normalize(&mut embedding);
        embedding
    }

    /// Spreads a word hash across eight dimensions.
    fn distribute_hash(embedding: &mut [f32], hash: u64) {
        let dimensions = embedding.len();
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize) % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(Error::InvalidInput(
                "hash embedder needs at least one dimension".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }
        Ok(self.pseudo_embed(text))
    }
}
