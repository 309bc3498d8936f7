//! Rule matching services.
//!
//! [`KeywordMatcher`] is always available. [`SemanticRuleMatcher`] layers
//! vector search on top of it when the embedding capabilities are present.

mod keyword;
mod keyword_patterns;
mod matcher;

pub use keyword::KeywordMatcher;
pub use keyword_patterns::{ERROR_PATTERNS, ErrorPattern, action_keywords};
pub use matcher::{MatcherState, SemanticRuleMatcher, compute_rules_hash};
