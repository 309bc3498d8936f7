//! Keyword scoring tables.
//!
//! Static pattern data for keyword rule matching, kept apart from the scoring
//! logic in `keyword.rs`.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

/// A failure signature linked to the rules that address it.
#[derive(Debug)]
pub struct ErrorPattern {
    /// Pattern applied to lowercased action parameters and rule text.
    pub pattern: Regex,
    /// Rules this pattern boosts.
    pub rule_ids: &'static [&'static str],
}

impl ErrorPattern {
    /// Returns true if `rule_id` is linked to this pattern.
    #[must_use]
    pub fn applies_to(&self, rule_id: &str) -> bool {
        self.rule_ids.contains(&rule_id)
    }
}

fn pattern(source: &str, rule_ids: &'static [&'static str]) -> ErrorPattern {
    ErrorPattern {
        pattern: Regex::new(source).expect("static regex: error pattern"),
        rule_ids,
    }
}

/// Known failure signatures.
///
/// Patterns run against lowercased text, so upper-case alternatives such as
/// `MFC` only ever match through their lower-case siblings.
pub static ERROR_PATTERNS: LazyLock<Vec<ErrorPattern>> = LazyLock::new(|| {
    vec![
        pattern(r"todo|task", &["ERR-001", "ERR-008"]),
        pattern(
            r"hook.*not.*found|file.*not.*found",
            &["ERR-002", "ERR-003", "ERR-004", "ERR-024"],
        ),
        pattern(r"edit.*fail|replace.*fail", &["ERR-003", "ERR-013", "ERR-023"]),
        pattern(r"file.*not.*found|path.*wrong", &["ERR-004", "ERR-022"]),
        pattern(r"port.*direction|input|output", &["ERR-005"]),
        pattern(r"reset|polarity|rst_n", &["ERR-006", "ERR-012"]),
        pattern(r"undriven|driver", &["ERR-007"]),
        pattern(r"parameter.*missing|required", &["ERR-008"]),
        pattern(r"grep.*match|pattern.*not", &["ERR-009"]),
        pattern(r"comment|//|#", &["ERR-014", "ERR-016"]),
        pattern(r"escape|backslash", &["ERR-015"]),
        pattern(r"instruction|command.*not.*follow", &["ERR-022"]),
        pattern(r"utf-?16|encoding|rc.*file|res.*file", &["ERR-023"]),
        pattern(r"hook.*directory|moai.*hook", &["ERR-024"]),
        pattern(r"OnInitDialog|MFC|control", &["ERR-600"]),
        pattern(r"dll.*architecture|x64|x86", &["ERR-601"]),
        pattern(r"CFile.*uninitialized", &["ERR-602"]),
    ]
});

/// Returns the keywords associated with an action kind.
///
/// Unknown kinds have no keywords.
#[must_use]
pub fn action_keywords(action_kind: &str) -> &'static [&'static str] {
    match action_kind {
        "Write" => &[
            "file", "write", "create", "save", "path", "directory", "encoding", "utf-8", "utf-16",
            "charset",
        ],
        "Edit" => &[
            "file",
            "edit",
            "modify",
            "replace",
            "path",
            "not found",
            "encoding",
            "utf-8",
            "utf-16",
            "string",
            "escape",
        ],
        "Bash" => &[
            "command",
            "git",
            "terminal",
            "shell",
            "path",
            "execute",
            "permissions",
            "directory",
        ],
        "Task" => &[
            "agent", "subagent", "task", "create", "parameter", "context", "delegate",
        ],
        "Read" => &["file", "read", "path", "not found", "encoding", "permission"],
        "Grep" => &["pattern", "search", "match", "regex", "grep", "find"],
        "Glob" => &["file", "pattern", "path", "find", "wildcard"],
        _ => &[],
    }
}
