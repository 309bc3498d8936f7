//! Brute-force index.

use super::{RuleIndexEntry, rank};
use crate::embedding::dot;
use crate::models::Rule;

/// Exhaustive inner-product index.
///
/// Scores every entry on each query. Rule sets are small (tens to a few
/// hundred entries), so this is fast enough to serve as the default.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimensions: usize,
    entries: Vec<RuleIndexEntry>,
}

impl FlatIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            entries: Vec::new(),
        }
    }

    /// Returns the vector dimension.
    #[must_use]
    pub const fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Returns the entries in position order.
    #[must_use]
    pub fn entries(&self) -> &[RuleIndexEntry] {
        &self.entries
    }

    pub(super) fn rules(&self) -> Vec<&Rule> {
        self.entries.iter().map(|e| &e.rule).collect()
    }

    pub(super) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Dimensions are checked by the caller.
    pub(super) fn add_rules(&mut self, rules: &[Rule], vectors: &[Vec<f32>]) {
        let start = self.entries.len();
        self.entries.extend(
            rules
                .iter()
                .zip(vectors)
                .enumerate()
                .map(|(offset, (rule, vector))| RuleIndexEntry {
                    rule: rule.clone(),
                    vector: vector.clone(),
                    position: start + offset,
                }),
        );
    }

    pub(super) fn search(&self, query: &[f32], k: usize) -> Vec<(&Rule, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .map(|e| (e.position, dot(query, &e.vector)))
            .collect();
        rank(&mut scored);
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(position, score)| (&self.entries[position].rule, score))
            .collect()
    }
}
