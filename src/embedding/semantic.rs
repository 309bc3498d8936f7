//! Embedding service used by the matcher.

use super::{
    Device, Embedder, FastEmbedEmbedder, ModelFamily, canonical_model_name, compose_query_text,
    compose_rule_text, default_dimensions, normalize,
};
use crate::config::{DEFAULT_BATCH_SIZE, MatcherConfig};
use crate::models::{ActionParams, Rule};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Turns rule and query text into unit-length vectors.
///
/// Wraps an optional [`Embedder`] backend. When no backend could be loaded
/// the service is *disabled*: [`encode`](Self::encode) and
/// [`encode_batch`](Self::encode_batch) return `None` and the matcher falls
/// back to keyword scoring. Availability is decided once at construction and
/// never retried.
#[derive(Clone)]
pub struct SemanticEmbedder {
    model_name: String,
    backend: Option<Arc<dyn Embedder>>,
    device_hint: Device,
    batch_size: usize,
}

impl SemanticEmbedder {
    /// Creates the embedder described by `config`, loading the model now.
    ///
    /// Unknown model names and load failures produce a disabled embedder and
    /// a warning.
    #[must_use]
    pub fn new(config: &MatcherConfig) -> Self {
        let device_hint = config.device.unwrap_or_else(Device::detect);
        let model_name = canonical_model_name(&config.model_name);

        let Some(family) = ModelFamily::resolve(&config.model_name) else {
            tracing::warn!(
                model = %config.model_name,
                "Unknown embedding model, semantic matching disabled"
            );
            return Self {
                device_hint,
                ..Self::disabled(model_name).with_batch_size(config.batch_size)
            };
        };

        let model_dir = config.cache_dir.join("models");
        match FastEmbedEmbedder::try_new(family, Some(model_dir)) {
            Ok(embedder) => Self {
                model_name,
                backend: Some(Arc::new(embedder)),
                device_hint,
                batch_size: config.batch_size.max(1),
            },
            Err(e) => {
                tracing::warn!(
                    model = %model_name,
                    error = %e,
                    "Embedding model unavailable, semantic matching disabled"
                );
                Self {
                    device_hint,
                    ..Self::disabled(model_name).with_batch_size(config.batch_size)
                }
            },
        }
    }

    /// Creates an embedder that never produces vectors.
    #[must_use]
    pub fn disabled(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            backend: None,
            device_hint: Device::Cpu,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Creates an embedder over an explicit backend.
    #[must_use]
    pub fn with_backend(model_name: impl Into<String>, backend: Arc<dyn Embedder>) -> Self {
        Self {
            model_name: model_name.into(),
            backend: Some(backend),
            device_hint: Device::Cpu,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the number of texts per backend call (minimum 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Returns true if a backend is loaded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Returns the vector dimension.
    ///
    /// The backend's dimension when loaded, otherwise the documented default
    /// for the configured model.
    #[must_use]
    pub fn embedding_dim(&self) -> usize {
        self.backend
            .as_ref()
            .map_or_else(|| default_dimensions(&self.model_name), |b| b.dimensions())
    }

    /// Returns the model name recorded in cache manifests.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns the device detected or configured at construction.
    ///
    /// Informational only: the model runs on fastembed's default execution
    /// provider whatever this reports.
    #[must_use]
    pub const fn device_hint(&self) -> Device {
        self.device_hint
    }

    /// Returns the batch size.
    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Encodes one text into a unit-length vector.
    ///
    /// Returns `None` when disabled or when the backend fails.
    #[must_use]
    pub fn encode(&self, text: &str) -> Option<Vec<f32>> {
        let backend = self.backend.as_ref()?;
        match backend.embed(text) {
            Ok(mut vector) => {
                if vector.len() != backend.dimensions() {
                    tracing::warn!(
                        expected = backend.dimensions(),
                        actual = vector.len(),
                        "Backend returned vector of unexpected dimension"
                    );
                    return None;
                }
                normalize(&mut vector);
                Some(vector)
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode text");
                None
            },
        }
    }

    /// Encodes many texts, `batch_size` at a time.
    ///
    /// The output has one vector per input, in input order, and does not
    /// depend on the batch size. Any backend failure yields `None` for the
    /// whole call.
    #[must_use]
    pub fn encode_batch(&self, texts: &[&str]) -> Option<Vec<Vec<f32>>> {
        let backend = self.backend.as_ref()?;
        let start = Instant::now();
        let dimensions = backend.dimensions();
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let batch = match backend.embed_batch(chunk) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        batch_size = chunk.len(),
                        "Failed to encode batch"
                    );
                    return None;
                },
            };
            if batch.len() != chunk.len() || batch.iter().any(|v| v.len() != dimensions) {
                tracing::warn!(
                    requested = chunk.len(),
                    returned = batch.len(),
                    dimensions,
                    "Backend returned malformed batch"
                );
                return None;
            }
            for mut vector in batch {
                normalize(&mut vector);
                vectors.push(vector);
            }
        }

        tracing::debug!(
            count = vectors.len(),
            dimensions,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Encoded batch"
        );
        Some(vectors)
    }

    /// Encodes a rule's canonical text.
    #[must_use]
    pub fn encode_rule(&self, rule: &Rule) -> Option<Vec<f32>> {
        self.encode(&compose_rule_text(rule))
    }

    /// Composes query text for an action.
    #[must_use]
    pub fn compose_query(&self, action_kind: &str, params: &ActionParams) -> String {
        compose_query_text(action_kind, params)
    }
}

impl fmt::Debug for SemanticEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SemanticEmbedder")
            .field("model_name", &self.model_name)
            .field("available", &self.is_available())
            .field("device_hint", &self.device_hint)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}
