//! Match results and action descriptions.

use super::Rule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameters of the action being checked (tool input).
///
/// Recognized keys: `file_path`, `command`, `subagent_type`, `pattern`. Any
/// other key is carried through to keyword scoring via its JSON rendering.
pub type ActionParams = serde_json::Map<String, serde_json::Value>;

/// Which signal surfaced a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    /// Cosine similarity between query and rule embeddings.
    Semantic,
    /// Keyword and error-pattern heuristics.
    Keyword,
}

impl MatchType {
    /// Returns the match type as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule surfaced for an action.
///
/// `relevance_score` is a cosine similarity in `[-1, 1]` for semantic hits and
/// an unbounded non-negative point total for keyword hits. The two scales are
/// not comparable; `match_type` says which one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The matched rule.
    #[serde(flatten)]
    pub rule: Rule,
    /// Score on the scale given by `match_type`.
    pub relevance_score: f32,
    /// Signal that produced the score.
    pub match_type: MatchType,
}

impl MatchResult {
    /// Creates a semantic match.
    #[must_use]
    pub const fn semantic(rule: Rule, score: f32) -> Self {
        Self {
            rule,
            relevance_score: score,
            match_type: MatchType::Semantic,
        }
    }

    /// Creates a keyword match.
    #[must_use]
    pub const fn keyword(rule: Rule, score: f32) -> Self {
        Self {
            rule,
            relevance_score: score,
            match_type: MatchType::Keyword,
        }
    }

    /// Returns the id of the matched rule.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.rule.id
    }
}

/// Sorts results by descending score, keeping the existing order for ties.
pub fn sort_by_score(results: &mut [MatchResult]) {
    results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
}
