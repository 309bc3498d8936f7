//! Keyword rule matching.
//!
//! Scores rules by keyword overlap with the action. Needs no optional
//! capability, so it is always available as the fallback signal.
//!
//! # Scoring
//!
//! Rule text is `"{id} {title} {problem} {solution}"` and the action text is
//! the JSON rendering of the parameters, both lowercased.
//!
//! | Signal | Points |
//! |--------|--------|
//! | Linked error pattern matches the action | +10 |
//! | Linked error pattern matches the rule | +5 |
//! | Action-kind keyword in rule | +2 |
//! | ... and also in the action | +3 |
//! | Action kind named in rule | +5 |
//! | `file_path` given and rule mentions "file" | +2 |
//! | `file_path` extension in rule | +3 |
//! | `Bash` command and rule both mention `git` / `npm` / `python` | +5 / +3 / +3 |
//! | `Task` agent type named in rule | +3 |

use super::keyword_patterns::{ERROR_PATTERNS, action_keywords};
use crate::embedding::{file_extension, render_value};
use crate::models::{ActionParams, MatchResult, Rule, sort_by_score};

/// Commands with a dedicated `Bash` bonus.
const COMMAND_BONUSES: [(&str, u32); 3] = [("git", 5), ("npm", 3), ("python", 3)];

/// Rule matcher based on keywords and error patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

/// Action data normalized once per query.
struct ActionText<'a> {
    kind: &'a str,
    kind_lower: String,
    params: String,
    keywords: &'static [&'static str],
    extension: Option<String>,
    has_file_path: bool,
    command: Option<String>,
    subagent: Option<String>,
}

impl<'a> ActionText<'a> {
    fn new(kind: &'a str, params: &ActionParams) -> Self {
        let file_path = params.get("file_path").map(|v| render_value(v).to_lowercase());
        Self {
            kind,
            kind_lower: kind.to_lowercase(),
            params: serde_json::to_string(params)
                .unwrap_or_default()
                .to_lowercase(),
            keywords: action_keywords(kind),
            extension: file_path
                .as_deref()
                .and_then(file_extension)
                .map(str::to_string),
            has_file_path: file_path.is_some(),
            command: params.get("command").map(|v| render_value(v).to_lowercase()),
            subagent: params
                .get("subagent_type")
                .map(|v| render_value(v).to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }
}

impl KeywordMatcher {
    /// Creates a keyword matcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Scores every rule against the action.
    ///
    /// Rules scoring zero are dropped. The rest are sorted by score,
    /// descending; equal scores keep their input order.
    #[must_use]
    pub fn match_rules(
        &self,
        rules: &[Rule],
        action_kind: &str,
        params: &ActionParams,
    ) -> Vec<MatchResult> {
        let action = ActionText::new(action_kind, params);

        let mut results: Vec<MatchResult> = rules
            .iter()
            .filter_map(|rule| {
                let score = Self::score_rule(rule, &action);
                #[allow(clippy::cast_precision_loss)]
                let relevance = score as f32;
                (score > 0).then(|| MatchResult::keyword(rule.clone(), relevance))
            })
            .collect();

        sort_by_score(&mut results);
        tracing::debug!(
            action_kind,
            rule_count = rules.len(),
            matched = results.len(),
            "Keyword match"
        );
        results
    }

    /// Returns the keyword score of one rule.
    #[must_use]
    pub fn score(&self, rule: &Rule, action_kind: &str, params: &ActionParams) -> u32 {
        Self::score_rule(rule, &ActionText::new(action_kind, params))
    }

    fn score_rule(rule: &Rule, action: &ActionText<'_>) -> u32 {
        let text = format!(
            "{} {} {} {}",
            rule.id, rule.title, rule.problem, rule.solution
        )
        .to_lowercase();
        let mut score = 0;

        for error in ERROR_PATTERNS.iter().filter(|p| p.applies_to(&rule.id)) {
            if error.pattern.is_match(&action.params) {
                score += 10;
            }
            if error.pattern.is_match(&text) {
                score += 5;
            }
        }

        for keyword in action.keywords {
            if text.contains(keyword) {
                score += 2;
                if action.params.contains(keyword) {
                    score += 3;
                }
            }
        }

        if !action.kind_lower.is_empty() && text.contains(&action.kind_lower) {
            score += 5;
        }

        if action.has_file_path {
            if text.contains("file") {
                score += 2;
            }
            if let Some(ext) = &action.extension {
                if text.contains(ext.as_str()) || text.contains(&ext.to_uppercase()) {
                    score += 3;
                }
            }
        }

        if action.kind == "Bash" {
            if let Some(command) = &action.command {
                for (name, bonus) in COMMAND_BONUSES {
                    if command.contains(name) && text.contains(name) {
                        score += bonus;
                    }
                }
            }
        }

        if action.kind == "Task" {
            if let Some(agent) = &action.subagent {
                if text.contains(agent.as_str()) {
                    score += 3;
                }
            }
        }

        score
    }
}
