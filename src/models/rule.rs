//! Error-prevention rule records.

use serde::{Deserialize, Serialize};

/// An error-prevention rule as supplied by the rule repository.
///
/// Rules are read-only inside ruleguard: they are composed into text,
/// embedded, and carried alongside their vector for display. Any text field
/// other than `id` may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier (e.g. `ERR-004`).
    pub id: String,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// What went wrong.
    #[serde(default)]
    pub problem: String,
    /// How it was fixed.
    #[serde(default)]
    pub solution: String,
    /// How to avoid it next time.
    #[serde(default)]
    pub prevention: String,
}

impl Rule {
    /// Creates a rule with an id and title; remaining fields are empty.
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the problem description.
    #[must_use]
    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = problem.into();
        self
    }

    /// Sets the solution.
    #[must_use]
    pub fn with_solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = solution.into();
        self
    }

    /// Sets the prevention advice.
    #[must_use]
    pub fn with_prevention(mut self, prevention: impl Into<String>) -> Self {
        self.prevention = prevention.into();
        self
    }
}

/// Collects the ids of a rule slice, preserving order.
#[must_use]
pub fn rule_ids(rules: &[Rule]) -> Vec<String> {
    rules.iter().map(|r| r.id.clone()).collect()
}
