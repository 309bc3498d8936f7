//! FastEmbed-based embedder.
//!
//! Provides sentence embeddings via fastembed-rs (ONNX runtime). When the
//! `fastembed-embeddings` feature is disabled, [`FastEmbedEmbedder::try_new`]
//! reports [`Error::CapabilityUnavailable`] so callers fall back to keyword
//! matching.

use super::ModelFamily;
use crate::{Error, Result};

// ============================================================================
// Native FastEmbed Implementation (with feature)
// ============================================================================

#[cfg(feature = "fastembed-embeddings")]
mod native {
    use super::{Error, ModelFamily, Result};
    use crate::embedding::Embedder;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Instant;

    /// `FastEmbed` embedder.
    ///
    /// The model is loaded eagerly in [`try_new`](Self::try_new) so that a
    /// missing runtime or download failure is detected once, at construction.
    /// The loaded model is owned by this instance and reused for every call.
    pub struct FastEmbedEmbedder {
        family: ModelFamily,
        model: Mutex<fastembed::TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        /// Loads the model for `family` with fastembed's default execution
        /// provider.
        ///
        /// `cache_dir` overrides fastembed's model download directory.
        ///
        /// # Errors
        ///
        /// Returns [`Error::OperationFailed`] if the model cannot be loaded.
        pub fn try_new(family: ModelFamily, cache_dir: Option<PathBuf>) -> Result<Self> {
            tracing::info!(model = family.model_name(), "Loading embedding model");
            let start = Instant::now();

            let mut options = fastembed::InitOptions::new(to_fastembed_model(family))
                .with_show_download_progress(false);
            if let Some(dir) = cache_dir {
                options = options.with_cache_dir(dir);
            }

            let model =
                fastembed::TextEmbedding::try_new(options).map_err(|e| Error::OperationFailed {
                    operation: "load_embedding_model".to_string(),
                    cause: e.to_string(),
                })?;

            tracing::info!(
                elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                model = family.model_name(),
                dimensions = family.dimensions(),
                "Embedding model loaded"
            );

            Ok(Self {
                family,
                model: Mutex::new(model),
            })
        }

        /// Returns the model preset.
        #[must_use]
        pub const fn family(&self) -> ModelFamily {
            self.family
        }

        fn run(&self, operation: &str, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
            let batch_size = texts.len();
            let mut model = self.model.lock().map_err(|e| Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("model lock poisoned: {e}"),
            })?;

            // ONNX runtime can panic on malformed inputs or internal errors.
            let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts, None)));

            result
                .map_err(|panic_info| {
                    let panic_msg = panic_info
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| panic_info.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(
                        panic_message = %panic_msg,
                        batch_size,
                        "ONNX runtime panicked during embedding"
                    );
                    Error::OperationFailed {
                        operation: operation.to_string(),
                        cause: format!("ONNX runtime panic: {panic_msg}"),
                    }
                })?
                .map_err(|e| Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: e.to_string(),
                })
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn dimensions(&self) -> usize {
            self.family.dimensions()
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.is_empty() {
                return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
            }

            self.run("embed", vec![text.to_string()])?
                .into_iter()
                .next()
                .ok_or_else(|| Error::OperationFailed {
                    operation: "embed".to_string(),
                    cause: "No embedding returned from model".to_string(),
                })
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            if texts.iter().any(|t| t.is_empty()) {
                return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
            }

            let owned: Vec<String> = texts.iter().map(|s| (*s).to_string()).collect();
            self.run("embed_batch", owned)
        }
    }

    const fn to_fastembed_model(family: ModelFamily) -> fastembed::EmbeddingModel {
        match family {
            ModelFamily::MiniLmL6V2 => fastembed::EmbeddingModel::AllMiniLML6V2,
            ModelFamily::MpnetBaseV2 => fastembed::EmbeddingModel::AllMpnetBaseV2,
            ModelFamily::MultilingualMpnet => fastembed::EmbeddingModel::ParaphraseMLMpnetBaseV2,
        }
    }
}

// ============================================================================
// Unavailable Implementation (without feature)
// ============================================================================

#[cfg(not(feature = "fastembed-embeddings"))]
mod unavailable {
    use super::{Error, ModelFamily, Result};
    use crate::embedding::Embedder;
    use std::path::PathBuf;

    /// `FastEmbed` embedder placeholder.
    ///
    /// Cannot be constructed: the crate was built without the
    /// `fastembed-embeddings` feature.
    pub struct FastEmbedEmbedder {
        family: ModelFamily,
    }

    impl FastEmbedEmbedder {
        /// Always fails with [`Error::CapabilityUnavailable`].
        ///
        /// # Errors
        ///
        /// Always.
        pub fn try_new(family: ModelFamily, _cache_dir: Option<PathBuf>) -> Result<Self> {
            Err(Error::CapabilityUnavailable(format!(
                "embedding model {} (compile with --features fastembed-embeddings)",
                family.model_name()
            )))
        }

        /// Returns the model preset.
        #[must_use]
        pub const fn family(&self) -> ModelFamily {
            self.family
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn dimensions(&self) -> usize {
            self.family.dimensions()
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(Error::CapabilityUnavailable("fastembed".to_string()))
        }
    }
}

// ============================================================================
// Public Re-exports
// ============================================================================

#[cfg(feature = "fastembed-embeddings")]
pub use native::FastEmbedEmbedder;

#[cfg(not(feature = "fastembed-embeddings"))]
pub use unavailable::FastEmbedEmbedder;
