//! # Ruleguard
//!
//! Semantic matching of error-prevention rules against upcoming tool actions.
//!
//! Ruleguard keeps a small knowledge base of rules (`ERR-004: File Path Not
//! Found`, ...) and, given the action an agent is about to take, returns the
//! rules most likely to prevent a repeat mistake.
//!
//! ## Features
//!
//! - Sentence embeddings via fastembed (`fastembed-embeddings` feature)
//! - Exact inner-product search via usearch (`usearch-hnsw` feature), with a
//!   pure-Rust flat index otherwise
//! - On-disk vector cache keyed to the current rule-id set
//! - Keyword scoring that keeps working with every optional capability absent
//!
//! ## Example
//!
//! ```rust
//! use ruleguard::{Capabilities, MatcherConfig, Rule, SemanticRuleMatcher};
//!
//! let rules = vec![
//!     Rule::new("ERR-004", "File Path Not Found").with_solution("Use Glob to verify paths"),
//!     Rule::new("ERR-013", "Edit Operation Failed").with_solution("Read file first"),
//! ];
//! let mut matcher = SemanticRuleMatcher::new(MatcherConfig::default(), Capabilities::none());
//! matcher.initialize(&rules);
//!
//! let params = serde_json::json!({ "file_path": "/tmp/missing.txt" });
//! let hits = matcher.match_action("Read", params.as_object().expect("object"));
//! assert_eq!(hits[0].rule.id, "ERR-004");
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// fastembed pulls several versions of the same transitive crates through ort.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod embedding;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{Capabilities, MatcherConfig};
pub use embedding::{Embedder, SemanticEmbedder, compose_query_text, compose_rule_text};
pub use models::{ActionParams, MatchResult, MatchType, Rule};
pub use services::{KeywordMatcher, MatcherState, SemanticRuleMatcher};
pub use storage::{CacheManifest, VectorCache, VectorIndex};

/// Error type for ruleguard operations.
///
/// Most failure modes in the matching engine are recovered locally (a missing
/// model degrades to keyword matching, a stale cache triggers regeneration).
/// The variants below are what remains visible to callers of the lower-level
/// components.
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty text passed to an embedder, out-of-range config values |
/// | `OperationFailed` | Model load, index I/O, or serialization failures |
/// | `CapabilityUnavailable` | A backend that was not compiled in or failed to load is used directly |
/// | `DimensionMismatch` | Vectors from different model configurations are mixed |
/// | `CacheCorrupt` | A cache artifact exists but cannot be decoded |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A backing capability (model runtime, native index) is not present.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A vector does not match the dimension the index was built with.
    ///
    /// This indicates vectors from different model configurations are being
    /// mixed and is never coerced.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was constructed with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// A cache artifact exists but could not be decoded.
    #[error("cache corrupt: {0}")]
    CacheCorrupt(String),
}

/// Result type alias for ruleguard operations.
pub type Result<T> = std::result::Result<T, Error>;
