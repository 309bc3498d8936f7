//! Data models for ruleguard.
//!
//! Rules come in from the rule repository; match results go out to callers.

mod matching;
mod rule;

pub use matching::{ActionParams, MatchResult, MatchType, sort_by_score};
pub use rule::{Rule, rule_ids};
