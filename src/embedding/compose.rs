//! Canonical text for rules and queries.
//!
//! Both composers are pure: identical input always yields identical text, so
//! cached rule vectors stay valid across processes.

use crate::models::{ActionParams, Rule};
use serde_json::Value;
use std::path::Path;

const SEPARATOR: &str = ". ";

/// Query segments, in output order: parameter key and label.
const QUERY_FIELDS: [(&str, &str); 3] = [
    ("command", "Command"),
    ("subagent_type", "Agent"),
    ("pattern", "Pattern"),
];

/// Composes the text embedded for a rule.
///
/// Non-empty fields in the order id, title, problem, solution, prevention,
/// joined with `". "`.
#[must_use]
pub fn compose_rule_text(rule: &Rule) -> String {
    [
        rule.id.as_str(),
        rule.title.as_str(),
        rule.problem.as_str(),
        rule.solution.as_str(),
        rule.prevention.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect::<Vec<_>>()
    .join(SEPARATOR)
}

/// Composes the text embedded for an action.
///
/// Always starts with `Kind: <action_kind>`, then adds `File`, `Extension`,
/// `Command`, `Agent` and `Pattern` segments for the recognized parameters
/// that are present.
#[must_use]
pub fn compose_query_text(action_kind: &str, params: &ActionParams) -> String {
    let mut parts = vec![format!("Kind: {action_kind}")];

    if let Some(value) = params.get("file_path") {
        let path = render_value(value);
        parts.push(format!("File: {path}"));
        if let Some(ext) = file_extension(&path) {
            parts.push(format!("Extension: {ext}"));
        }
    }

    for (key, label) in QUERY_FIELDS {
        if let Some(value) = params.get(key) {
            parts.push(format!("{label}: {}", render_value(value)));
        }
    }

    parts.join(SEPARATOR)
}

/// Returns the extension of a path, without the dot.
#[must_use]
pub fn file_extension(path: &str) -> Option<&str> {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}

/// Renders a parameter value: strings verbatim, anything else as compact JSON.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
