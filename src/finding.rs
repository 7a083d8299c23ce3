//! Script-injection findings produced by the workflow analyzer.

use serde::{Deserialize, Serialize};

/// A located instance of a dangerous expression that needs remediation.
///
/// Findings are read-only input. `offset` is the 1-based line of the `run`
/// command containing the expression and `snippet` is the expression text
/// itself (e.g. `github.event.issue.title`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Finding {
    pub path: String,
    pub offset: usize,
    pub snippet: String,
}

impl Finding {
    #[must_use]
    pub fn new(path: impl Into<String>, offset: usize, snippet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            offset,
            snippet: snippet.into(),
        }
    }

    /// The dangerous expression with surrounding whitespace removed.
    #[must_use]
    pub fn unsafe_expression(&self) -> &str {
        self.snippet.trim()
    }

    /// Parse a JSON array of findings.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the input is not a JSON array of
    /// `{path, offset, snippet}` objects.
    pub fn parse_list(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
