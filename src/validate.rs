//! Patch validation against syntax regressions.
//!
//! A patched workflow may legitimately keep the diagnostics the original
//! already had; it must not add new ones. Patched diagnostics are paired
//! greedily, in order, with the original's. Whatever is left unpaired is a
//! regression.

use serde::{Deserialize, Serialize};

/// One problem reported by re-parsing a workflow.
///
/// Only `(column, kind, normalized message)` takes part in comparisons; the
/// line moves whenever the patch inserts lines above it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub kind: String,
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        line: usize,
        column: usize,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            column,
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// The message up to its first sentence boundary.
    ///
    /// Some messages embed line numbers after the first sentence; those drift
    /// once lines are inserted and must not count as a difference.
    #[must_use]
    pub fn normalized_message(&self) -> &str {
        self.message.split('.').next().unwrap_or_default()
    }

    /// Same problem, possibly on a different line.
    #[must_use]
    pub fn same_problem(&self, other: &Self) -> bool {
        self.column == other.column
            && self.kind == other.kind
            && self.normalized_message() == other.normalized_message()
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}]",
            self.line, self.column, self.message, self.kind
        )
    }
}

/// Re-parses workflow content into diagnostics.
///
/// Implementations must be deterministic: the same content always yields the
/// same diagnostics, in the same order.
pub trait WorkflowParser: Send + Sync {
    fn parse(&self, content: &str) -> Vec<Diagnostic>;
}

impl<F> WorkflowParser for F
where
    F: Fn(&str) -> Vec<Diagnostic> + Send + Sync,
{
    fn parse(&self, content: &str) -> Vec<Diagnostic> {
        self(content)
    }
}

/// Patched diagnostics that have no counterpart in the original.
#[must_use]
pub fn find_regressions(patched: &[Diagnostic], original: &[Diagnostic]) -> Vec<Diagnostic> {
    let mut remaining = original.iter().peekable();
    let mut regressions = Vec::new();

    for diagnostic in patched {
        match remaining.peek() {
            Some(orig) if orig.same_problem(diagnostic) => {
                remaining.next();
            }
            _ => regressions.push(diagnostic.clone()),
        }
    }

    regressions
}

/// Re-parse `patched_content` and return the diagnostics the patch introduced.
#[must_use]
pub fn validate(
    parser: &dyn WorkflowParser,
    patched_content: &str,
    original: &[Diagnostic],
) -> Vec<Diagnostic> {
    let patched = parser.parse(patched_content);
    if patched.is_empty() {
        return patched;
    }
    let regressions = find_regressions(&patched, original);
    if !regressions.is_empty() {
        tracing::warn!(
            count = regressions.len(),
            "patched workflow has new diagnostics"
        );
    }
    regressions
}
