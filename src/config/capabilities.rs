//! Runtime capability probe.

/// Which optional backends are usable in this process.
///
/// Computed once when a matcher is constructed and never re-derived: a
/// matcher built without embedding support stays keyword-only for its whole
/// lifetime. Tests build the value explicitly instead of toggling features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// An embedding model runtime is compiled in.
    pub embedding: bool,
    /// The native (usearch) index is compiled in.
    pub accelerated_index: bool,
    /// The vector cache can be used.
    pub vector_cache: bool,
}

impl Capabilities {
    /// Probes the compiled-in backends.
    ///
    /// The embedding model itself is loaded later by
    /// [`SemanticEmbedder`](crate::embedding::SemanticEmbedder); a load
    /// failure there also disables semantic matching.
    #[must_use]
    pub const fn probe() -> Self {
        Self {
            embedding: cfg!(feature = "fastembed-embeddings"),
            accelerated_index: cfg!(feature = "usearch-hnsw"),
            vector_cache: true,
        }
    }

    /// No optional capabilities: keyword matching only.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            embedding: false,
            accelerated_index: false,
            vector_cache: false,
        }
    }

    /// Every optional capability.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            embedding: true,
            accelerated_index: true,
            vector_cache: true,
        }
    }

    /// Embedding and cache available, flat index.
    #[must_use]
    pub const fn semantic() -> Self {
        Self {
            embedding: true,
            accelerated_index: false,
            vector_cache: true,
        }
    }

    /// Returns true if semantic matching can be wired at all.
    #[must_use]
    pub const fn supports_semantic(&self) -> bool {
        self.embedding && self.vector_cache
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::probe()
    }
}
