//! Remediation failures.
//!
//! Every failure is fatal to the single finding being remediated and never to
//! the run. None of them are transient: the same finding against the same
//! document always fails the same way, so nothing is retried.

use serde::Serialize;

use crate::finding::Finding;
use crate::validate::Diagnostic;

/// What went wrong while remediating one finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemediationErrorKind {
    /// The snippet matches no catalog entry: the analyzer and the remediator
    /// disagree about what is dangerous.
    UnknownDangerousVariable { expression: String },
    /// The finding's line is outside the document: the finding is stale.
    InvalidOffset { offset: usize, line_count: usize },
    /// The document has no top-level `on:` block.
    NoGlobalIndent,
    /// A new `env:` block is needed but there is no `jobs:` label to put it above.
    NoInsertionPoint,
    /// Re-parsing the patched document produced diagnostics the original did not have.
    PatchRegression { diagnostics: Vec<Diagnostic> },
}

impl RemediationErrorKind {
    /// Stable identifier, used in logs and JSON output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownDangerousVariable { .. } => "unknown_dangerous_variable",
            Self::InvalidOffset { .. } => "invalid_offset",
            Self::NoGlobalIndent => "no_global_indent",
            Self::NoInsertionPoint => "no_insertion_point",
            Self::PatchRegression { .. } => "patch_regression",
        }
    }
}

impl std::fmt::Display for RemediationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownDangerousVariable { expression } => {
                write!(f, "unknown dangerous variable: {expression}")
            }
            Self::InvalidOffset { offset, line_count } => {
                write!(
                    f,
                    "invalid dangerous workflow offset: line {offset} (document has {line_count} lines)"
                )
            }
            Self::NoGlobalIndent => write!(f, "could not determine global indentation"),
            Self::NoInsertionPoint => {
                write!(f, "could not determine location for new environment")
            }
            Self::PatchRegression { diagnostics } => {
                write!(
                    f,
                    "patched workflow introduces {} new diagnostic(s)",
                    diagnostics.len()
                )
            }
        }
    }
}

/// A remediation failure tied to the finding that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemediationError {
    pub path: String,
    pub offset: usize,
    pub snippet: String,
    #[serde(flatten)]
    pub kind: RemediationErrorKind,
}

impl RemediationError {
    #[must_use]
    pub fn new(finding: &Finding, kind: RemediationErrorKind) -> Self {
        Self {
            path: finding.path.clone(),
            offset: finding.offset,
            snippet: finding.snippet.clone(),
            kind,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &RemediationErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for RemediationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path, self.offset, self.kind)?;
        if let RemediationErrorKind::PatchRegression { diagnostics } = &self.kind {
            for d in diagnostics {
                write!(f, "\n  {}:{d}", self.path)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RemediationError {}
