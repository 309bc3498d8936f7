//! Native usearch index.
//!
//! When the `usearch-hnsw` feature is enabled this wraps a usearch index
//! configured for inner product. Queries use usearch's exact search so
//! rankings match [`FlatIndex`](super::FlatIndex). Without the feature,
//! [`UsearchIndex::new`] reports [`Error::CapabilityUnavailable`] and
//! [`VectorIndex`](super::VectorIndex) falls back to the flat index.

use crate::models::Rule;
use crate::{Error, Result};
use std::path::Path;

/// File holding the usearch graph.
pub const INDEX_FILE: &str = "index.usearch";

/// File holding the indexed rules in position order.
pub const RULES_FILE: &str = "rules.json";

/// HNSW connectivity parameter (M).
#[cfg(feature = "usearch-hnsw")]
const HNSW_CONNECTIVITY: usize = 16;

/// HNSW expansion factor for construction (`ef_construction`).
#[cfg(feature = "usearch-hnsw")]
const HNSW_EXPANSION_ADD: usize = 128;

/// HNSW expansion factor for search (`ef`).
#[cfg(feature = "usearch-hnsw")]
const HNSW_EXPANSION_SEARCH: usize = 64;

// ============================================================================
// Native usearch Implementation (with feature)
// ============================================================================

#[cfg(feature = "usearch-hnsw")]
mod native {
    use super::{
        Error, HNSW_CONNECTIVITY, HNSW_EXPANSION_ADD, HNSW_EXPANSION_SEARCH, INDEX_FILE, Path,
        RULES_FILE, Result, Rule,
    };
    use crate::storage::vector::rank;
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use std::fs;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    /// usearch-backed index; keys are insertion positions.
    pub struct UsearchIndex {
        dimensions: usize,
        index: Index,
        rules: Vec<Rule>,
    }

    /// Sidecar persisted next to the usearch graph.
    #[derive(Serialize, Deserialize)]
    struct IndexMetadata {
        dimensions: usize,
        rules: Vec<Rule>,
    }

    impl UsearchIndex {
        /// Creates an empty index.
        ///
        /// # Errors
        ///
        /// Returns an error if usearch cannot allocate the index.
        pub fn new(dimensions: usize) -> Result<Self> {
            let options = IndexOptions {
                dimensions,
                metric: MetricKind::IP,
                quantization: ScalarKind::F32,
                connectivity: HNSW_CONNECTIVITY,
                expansion_add: HNSW_EXPANSION_ADD,
                expansion_search: HNSW_EXPANSION_SEARCH,
                multi: false,
            };

            let index = Index::new(&options).map_err(|e| Error::OperationFailed {
                operation: "create_usearch_index".to_string(),
                cause: e.to_string(),
            })?;

            Ok(Self {
                dimensions,
                index,
                rules: Vec::new(),
            })
        }

        /// Returns the vector dimension.
        #[must_use]
        pub const fn dimensions(&self) -> usize {
            self.dimensions
        }

        /// Returns the number of indexed rules.
        #[must_use]
        pub fn size(&self) -> usize {
            self.rules.len()
        }

        pub(in crate::storage::vector) fn rules(&self) -> Vec<&Rule> {
            self.rules.iter().collect()
        }

        pub(in crate::storage::vector) fn clear(&mut self) -> Result<()> {
            self.index.reset().map_err(|e| Error::OperationFailed {
                operation: "usearch_reset".to_string(),
                cause: e.to_string(),
            })?;
            self.rules.clear();
            Ok(())
        }

        /// Dimensions are checked by the caller.
        pub(in crate::storage::vector) fn add_rules(
            &mut self,
            rules: &[Rule],
            vectors: &[Vec<f32>],
        ) -> Result<()> {
            let start = self.rules.len();
            self.index
                .reserve(start + rules.len())
                .map_err(|e| Error::OperationFailed {
                    operation: "reserve_usearch_capacity".to_string(),
                    cause: e.to_string(),
                })?;

            for (offset, (rule, vector)) in rules.iter().zip(vectors).enumerate() {
                let key = position_key(start + offset)?;
                self.index
                    .add(key, vector)
                    .map_err(|e| Error::OperationFailed {
                        operation: "usearch_add".to_string(),
                        cause: e.to_string(),
                    })?;
                self.rules.push(rule.clone());
            }
            Ok(())
        }

        pub(in crate::storage::vector) fn search(
            &self,
            query: &[f32],
            k: usize,
        ) -> Result<Vec<(&Rule, f32)>> {
            // Every rule is scored so ties at the k-th slot resolve by position.
            let matches =
                self.index
                    .exact_search(query, self.rules.len())
                    .map_err(|e| Error::OperationFailed {
                        operation: "usearch_search".to_string(),
                        cause: e.to_string(),
                    })?;

            // Inner-product distance is 1 - dot.
            let mut scored: Vec<(usize, f32)> = matches
                .keys
                .iter()
                .zip(matches.distances.iter())
                .filter_map(|(&key, &distance)| {
                    let position = usize::try_from(key).ok()?;
                    (position < self.rules.len()).then_some((position, 1.0 - distance))
                })
                .collect();
            rank(&mut scored);
            scored.truncate(k);

            Ok(scored
                .into_iter()
                .map(|(position, score)| (&self.rules[position], score))
                .collect())
        }

        pub(in crate::storage::vector) fn save(&self, dir: &Path) -> Result<()> {
            fs::create_dir_all(dir).map_err(|e| Error::OperationFailed {
                operation: "create_usearch_dir".to_string(),
                cause: e.to_string(),
            })?;

            let index_file = dir.join(INDEX_FILE);
            self.index
                .save(index_file.to_string_lossy().as_ref())
                .map_err(|e| Error::OperationFailed {
                    operation: "save_usearch_index".to_string(),
                    cause: e.to_string(),
                })?;

            let meta = IndexMetadata {
                dimensions: self.dimensions,
                rules: self.rules.clone(),
            };
            let content = serde_json::to_string(&meta).map_err(|e| Error::OperationFailed {
                operation: "serialize_usearch_meta".to_string(),
                cause: e.to_string(),
            })?;
            fs::write(dir.join(RULES_FILE), content).map_err(|e| Error::OperationFailed {
                operation: "write_usearch_meta".to_string(),
                cause: e.to_string(),
            })?;

            tracing::info!(
                path = %dir.display(),
                rule_count = self.rules.len(),
                "Saved native index"
            );
            Ok(())
        }

        pub(in crate::storage::vector) fn load(&mut self, dir: &Path) -> Result<bool> {
            let index_file = dir.join(INDEX_FILE);
            let meta_file = dir.join(RULES_FILE);
            if !index_file.exists() || !meta_file.exists() {
                return Ok(false);
            }

            let content = fs::read_to_string(&meta_file).map_err(|e| Error::OperationFailed {
                operation: "load_usearch_meta".to_string(),
                cause: e.to_string(),
            })?;
            let meta: IndexMetadata = serde_json::from_str(&content)
                .map_err(|e| Error::CacheCorrupt(format!("{}: {e}", meta_file.display())))?;

            if meta.dimensions != self.dimensions {
                return Err(Error::DimensionMismatch {
                    expected: self.dimensions,
                    actual: meta.dimensions,
                });
            }

            self.index
                .load(index_file.to_string_lossy().as_ref())
                .map_err(|e| Error::OperationFailed {
                    operation: "load_usearch_index".to_string(),
                    cause: e.to_string(),
                })?;

            if self.index.size() != meta.rules.len() {
                let found = self.index.size();
                self.clear()?;
                return Err(Error::CacheCorrupt(format!(
                    "index holds {found} vectors but {} rules are recorded",
                    meta.rules.len()
                )));
            }

            self.rules = meta.rules;
            tracing::info!(
                path = %dir.display(),
                rule_count = self.rules.len(),
                "Loaded native index"
            );
            Ok(true)
        }
    }

    impl fmt::Debug for UsearchIndex {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("UsearchIndex")
                .field("dimensions", &self.dimensions)
                .field("size", &self.rules.len())
                .finish_non_exhaustive()
        }
    }

    fn position_key(position: usize) -> Result<u64> {
        u64::try_from(position)
            .map_err(|_| Error::InvalidInput(format!("position {position} overflows key")))
    }
}

// ============================================================================
// Unavailable Implementation (without feature)
// ============================================================================

#[cfg(not(feature = "usearch-hnsw"))]
mod unavailable {
    use super::{Error, Path, Result, Rule};
    use std::convert::Infallible;

    /// Native index placeholder.
    ///
    /// Cannot be constructed: the crate was built without the `usearch-hnsw`
    /// feature.
    #[derive(Debug)]
    pub struct UsearchIndex {
        never: Infallible,
    }

    impl UsearchIndex {
        /// Always fails with [`Error::CapabilityUnavailable`].
        ///
        /// # Errors
        ///
        /// Always.
        pub fn new(_dimensions: usize) -> Result<Self> {
            Err(Error::CapabilityUnavailable(
                "usearch index (compile with --features usearch-hnsw)".to_string(),
            ))
        }

        /// Returns the vector dimension.
        #[must_use]
        pub const fn dimensions(&self) -> usize {
            match self.never {}
        }

        /// Returns the number of indexed rules.
        #[must_use]
        pub const fn size(&self) -> usize {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn rules(&self) -> Vec<&Rule> {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn clear(&mut self) -> Result<()> {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn add_rules(
            &mut self,
            _rules: &[Rule],
            _vectors: &[Vec<f32>],
        ) -> Result<()> {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn search(
            &self,
            _query: &[f32],
            _k: usize,
        ) -> Result<Vec<(&Rule, f32)>> {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn save(&self, _dir: &Path) -> Result<()> {
            match self.never {}
        }

        pub(in crate::storage::vector) const fn load(&mut self, _dir: &Path) -> Result<bool> {
            match self.never {}
        }
    }
}

// ============================================================================
// Public Re-exports
// ============================================================================

#[cfg(feature = "usearch-hnsw")]
pub use native::UsearchIndex;

#[cfg(not(feature = "usearch-hnsw"))]
pub use unavailable::UsearchIndex;

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "usearch-hnsw"))]
    #[test]
    fn test_new_without_feature() {
        assert!(matches!(
            UsearchIndex::new(4),
            Err(Error::CapabilityUnavailable(_))
        ));
    }

    #[cfg(feature = "usearch-hnsw")]
    mod native_tests {
        use super::super::*;
        use crate::storage::vector::VectorIndex;

        fn index_with(vectors: &[Vec<f32>]) -> VectorIndex {
            let mut index = VectorIndex::Accelerated(UsearchIndex::new(2).expect("index"));
            let rules: Vec<Rule> = (0..vectors.len())
                .map(|i| Rule::new(format!("ERR-{i:03}"), "rule"))
                .collect();
            index.add_rules(&rules, vectors).expect("add");
            index
        }

        #[test]
        fn test_exact_search_scores() {
            let index = index_with(&[vec![1.0, 0.0], vec![0.6, 0.8]]);
            let hits = index.search(&[1.0, 0.0], 2, 0.0).expect("search");
            assert_eq!(hits[0].0.id, "ERR-000");
            assert!((hits[0].1 - 1.0).abs() < 1e-5);
            assert!((hits[1].1 - 0.6).abs() < 1e-5);
        }

        #[test]
        fn test_ties_keep_earliest_positions() {
            let index = index_with(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]]);
            let hits = index.search(&[1.0, 0.0], 2, f32::NEG_INFINITY).expect("search");
            let ids: Vec<&str> = hits.iter().map(|(rule, _)| rule.id.as_str()).collect();
            assert_eq!(ids, vec!["ERR-000", "ERR-001"]);
        }

        #[test]
        fn test_save_and_load() {
            let dir = tempfile::tempdir().expect("tempdir");
            let index = index_with(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
            assert!(index.save(dir.path()).expect("save"));
            assert!(dir.path().join(INDEX_FILE).exists());
            assert!(dir.path().join(RULES_FILE).exists());

            let mut restored = VectorIndex::Accelerated(UsearchIndex::new(2).expect("index"));
            assert!(restored.load(dir.path()).expect("load"));
            assert_eq!(restored.size(), 2);
            let hits = restored.search(&[0.0, 1.0], 1, 0.0).expect("search");
            assert_eq!(hits[0].0.id, "ERR-001");
        }

        #[test]
        fn test_load_missing_dir() {
            let dir = tempfile::tempdir().expect("tempdir");
            let mut index = VectorIndex::Accelerated(UsearchIndex::new(2).expect("index"));
            assert!(!index.load(dir.path()).expect("load"));
        }
    }
}
