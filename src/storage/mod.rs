//! Storage layer.
//!
//! Two pieces back the semantic matcher:
//! - **Cache**: rule vectors persisted between runs ([`VectorCache`])
//! - **Vector**: similarity search over the current rule set ([`VectorIndex`])

// Allow cast precision loss for score calculations where exact precision is not critical.
#![allow(clippy::cast_precision_loss)]

pub mod cache;
pub mod vector;

pub use cache::{CACHE_FORMAT_VERSION, CacheManifest, VectorCache};
pub use vector::{FlatIndex, RuleIndexEntry, UsearchIndex, VectorIndex};
