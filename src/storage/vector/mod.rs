//! Nearest-neighbor search over rule vectors.
//!
//! [`VectorIndex`] picks one of two strategies when it is built:
//!
//! | Strategy | Backing | Persistence |
//! |----------|---------|-------------|
//! | [`UsearchIndex`] | native usearch, inner product, exact search | `index.usearch` + `rules.json` |
//! | [`FlatIndex`] | brute-force dot products | unsupported |
//!
//! Both return the same ranking: score descending, ties broken by insertion
//! position. Scores are inner products of unit vectors, i.e. cosine
//! similarity.

mod flat;
mod usearch;

pub use flat::FlatIndex;
pub use usearch::UsearchIndex;

use crate::config::Capabilities;
use crate::models::Rule;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::path::Path;

/// A rule stored in an index, with its vector and insertion position.
///
/// Positions start at 0 and are never reused until the index is cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleIndexEntry {
    /// The indexed rule.
    pub rule: Rule,
    /// Unit-length embedding of the rule text.
    pub vector: Vec<f32>,
    /// Insertion position.
    pub position: usize,
}

/// Similarity index over rules.
#[derive(Debug)]
pub enum VectorIndex {
    /// Pure-Rust brute-force index.
    Flat(FlatIndex),
    /// Native usearch index.
    Accelerated(UsearchIndex),
}

impl VectorIndex {
    /// Creates an index for vectors of `dimensions`.
    ///
    /// Uses the native index when `capabilities` allow it and it can be
    /// created; otherwise the flat index.
    #[must_use]
    pub fn new(dimensions: usize, capabilities: &Capabilities) -> Self {
        if capabilities.accelerated_index {
            match UsearchIndex::new(dimensions) {
                Ok(index) => return Self::Accelerated(index),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        dimensions,
                        "Native index unavailable, using flat index"
                    );
                },
            }
        }
        Self::flat(dimensions)
    }

    /// Creates a flat index.
    #[must_use]
    pub const fn flat(dimensions: usize) -> Self {
        Self::Flat(FlatIndex::new(dimensions))
    }

    /// Returns true for the native index.
    #[must_use]
    pub const fn is_accelerated(&self) -> bool {
        matches!(self, Self::Accelerated(_))
    }

    /// Returns the vector dimension.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        match self {
            Self::Flat(index) => index.dimensions(),
            Self::Accelerated(index) => index.dimensions(),
        }
    }

    /// Returns the number of indexed rules.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Flat(index) => index.size(),
            Self::Accelerated(index) => index.size(),
        }
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns the indexed rules in position order.
    #[must_use]
    pub fn rules(&self) -> Vec<&Rule> {
        match self {
            Self::Flat(index) => index.rules(),
            Self::Accelerated(index) => index.rules(),
        }
    }

    /// Removes every entry and resets positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the native index cannot be reset.
    pub fn clear(&mut self) -> Result<()> {
        match self {
            Self::Flat(index) => {
                index.clear();
                Ok(())
            },
            Self::Accelerated(index) => index.clear(),
        }
    }

    /// Appends rules with their vectors.
    ///
    /// Nothing is added unless every vector has the index dimension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the slices differ in length,
    /// [`Error::DimensionMismatch`] for a vector of the wrong dimension, or
    /// [`Error::OperationFailed`] if the native index rejects an insert.
    pub fn add_rules(&mut self, rules: &[Rule], vectors: &[Vec<f32>]) -> Result<bool> {
        if rules.len() != vectors.len() {
            return Err(Error::InvalidInput(format!(
                "{} rules but {} vectors",
                rules.len(),
                vectors.len()
            )));
        }
        let dimensions = self.dimensions();
        for vector in vectors {
            check_dimensions(dimensions, vector)?;
        }
        if rules.is_empty() {
            return Ok(true);
        }

        match self {
            Self::Flat(index) => index.add_rules(rules, vectors),
            Self::Accelerated(index) => index.add_rules(rules, vectors)?,
        }

        tracing::debug!(
            added = rules.len(),
            size = self.size(),
            accelerated = self.is_accelerated(),
            "Added rules to index"
        );
        Ok(true)
    }

    /// Appends a single rule.
    ///
    /// # Errors
    ///
    /// Same as [`add_rules`](Self::add_rules).
    pub fn add_rule(&mut self, rule: Rule, vector: Vec<f32>) -> Result<bool> {
        self.add_rules(std::slice::from_ref(&rule), std::slice::from_ref(&vector))
    }

    /// Returns the `k` most similar rules with scores of at least `min_score`.
    ///
    /// The floor is applied after the top `k` are selected, so fewer than `k`
    /// results may come back even when more rules clear it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `query` has the wrong
    /// dimension, or [`Error::OperationFailed`] if the native search fails.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<(Rule, f32)>> {
        check_dimensions(self.dimensions(), query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let hits = match self {
            Self::Flat(index) => index.search(query, k),
            Self::Accelerated(index) => index.search(query, k)?,
        };

        Ok(hits
            .into_iter()
            .filter(|(_, score)| *score >= min_score)
            .map(|(rule, score)| (rule.clone(), score))
            .collect())
    }

    /// Persists the index under `dir`.
    ///
    /// Returns `Ok(false)` for the flat index, which has no on-disk form.
    ///
    /// # Errors
    ///
    /// Returns an error if the native index cannot be written.
    pub fn save(&self, dir: &Path) -> Result<bool> {
        match self {
            Self::Flat(_) => Ok(false),
            Self::Accelerated(index) => index.save(dir).map(|()| true),
        }
    }

    /// Replaces the contents with an index persisted under `dir`.
    ///
    /// Returns `Ok(false)` for the flat index or when nothing is stored there.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored index cannot be read or does not match
    /// this index's dimension.
    pub fn load(&mut self, dir: &Path) -> Result<bool> {
        match self {
            Self::Flat(_) => Ok(false),
            Self::Accelerated(index) => index.load(dir),
        }
    }
}

/// Fails unless `vector` has `expected` components.
pub(crate) fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}

/// Orders `(position, score)` pairs by score descending, then position.
pub(crate) fn rank(scored: &mut [(usize, f32)]) {
    scored.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(dimensions: usize, axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; dimensions];
        v[axis] = 1.0;
        v
    }

    fn rules(n: usize) -> Vec<Rule> {
        (0..n)
            .map(|i| Rule::new(format!("ERR-{i:03}"), format!("Rule {i}")))
            .collect()
    }

    fn ids(hits: &[(Rule, f32)]) -> Vec<&str> {
        hits.iter().map(|(r, _)| r.id.as_str()).collect()
    }

    #[test]
    fn test_new_without_acceleration_is_flat() {
        let index = VectorIndex::new(4, &Capabilities::none());
        assert!(!index.is_accelerated());
        assert_eq!(index.dimensions(), 4);
        assert!(index.is_empty());
    }

    #[cfg(not(feature = "usearch-hnsw"))]
    #[test]
    fn test_requested_acceleration_falls_back_to_flat() {
        let index = VectorIndex::new(4, &Capabilities::all());
        assert!(!index.is_accelerated());
    }

    #[test]
    fn test_self_similarity_is_top_hit() {
        let mut index = VectorIndex::flat(3);
        let vectors = vec![unit(3, 0), unit(3, 1), unit(3, 2)];
        assert!(index.add_rules(&rules(3), &vectors).expect("add"));

        let hits = index.search(&vectors[1], 1, 0.0).expect("search");
        assert_eq!(ids(&hits), vec!["ERR-001"]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_equal_scores_keep_insertion_order() {
        let mut index = VectorIndex::flat(2);
        let v = vec![1.0, 0.0];
        index
            .add_rules(&rules(3), &[v.clone(), v.clone(), v.clone()])
            .expect("add");

        let hits = index.search(&v, 3, -1.0).expect("search");
        assert_eq!(ids(&hits), vec!["ERR-000", "ERR-001", "ERR-002"]);
    }

    #[test]
    fn test_min_score_applies_after_top_k() {
        let mut index = VectorIndex::flat(2);
        let vectors = vec![vec![1.0, 0.0], vec![0.6, 0.8], vec![0.0, 1.0]];
        index.add_rules(&rules(3), &vectors).expect("add");

        let query = [1.0, 0.0];
        let hits = index.search(&query, 2, 0.5).expect("search");
        assert_eq!(ids(&hits), vec!["ERR-000", "ERR-001"]);

        let hits = index.search(&query, 3, 0.7).expect("search");
        assert_eq!(ids(&hits), vec!["ERR-000"]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = VectorIndex::flat(3);
        assert!(index.search(&unit(3, 0), 5, 0.0).expect("search").is_empty());
    }

    #[test]
    fn test_search_k_zero() {
        let mut index = VectorIndex::flat(2);
        index.add_rule(Rule::new("ERR-001", "x"), vec![1.0, 0.0]).expect("add");
        assert!(index.search(&[1.0, 0.0], 0, 0.0).expect("search").is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let mut index = VectorIndex::flat(3);
        index.add_rule(Rule::new("ERR-001", "x"), unit(3, 0)).expect("add");
        let result = index.search(&[1.0, 0.0], 1, 0.0);
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_add_dimension_mismatch_adds_nothing() {
        let mut index = VectorIndex::flat(2);
        let result = index.add_rules(&rules(2), &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]]);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
        assert!(index.is_empty());
    }

    #[test]
    fn test_add_length_mismatch() {
        let mut index = VectorIndex::flat(2);
        let result = index.add_rules(&rules(2), &[vec![1.0, 0.0]]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_clear_resets_positions() {
        let mut index = VectorIndex::flat(2);
        index.add_rules(&rules(2), &[vec![1.0, 0.0], vec![0.0, 1.0]]).expect("add");
        index.clear().expect("clear");
        assert_eq!(index.size(), 0);

        index.add_rule(Rule::new("ERR-100", "again"), vec![1.0, 0.0]).expect("add");
        let rules: Vec<&str> = index.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(rules, vec!["ERR-100"]);
    }

    #[test]
    fn test_flat_persistence_unsupported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut index = VectorIndex::flat(2);
        index.add_rule(Rule::new("ERR-001", "x"), vec![1.0, 0.0]).expect("add");
        assert!(!index.save(dir.path()).expect("save"));
        assert!(!index.load(dir.path()).expect("load"));
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn test_rank_orders_by_score_then_position() {
        let mut scored = vec![(2, 0.5), (0, 0.9), (1, 0.5), (3, 0.95)];
        rank(&mut scored);
        let order: Vec<usize> = scored.iter().map(|(p, _)| *p).collect();
        assert_eq!(order, vec![3, 0, 1, 2]);
    }
}
