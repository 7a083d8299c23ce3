//! Remediation of script-injection findings.
//!
//! One finding is remediated against a private copy of the document:
//!
//! ```text
//! offset check → classify → reconcile declarations → rewrite site
//!              → validate (re-parse) → unified diff
//! ```
//!
//! Any failure discards the copy; nothing partial ever reaches the caller.

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::catalog::classify;
use crate::declarations::{DEFAULT_RENAME_SUFFIX, reconcile};
use crate::diff::{DEFAULT_CONTEXT_LINES, unified_diff};
use crate::document::Document;
use crate::error::{RemediationError, RemediationErrorKind};
use crate::finding::Finding;
use crate::rewriter::{line_index, rewrite_site};
use crate::validate::{Diagnostic, WorkflowParser, validate};

/// Engine-facing knobs, usually projected from the `[remediation]` config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOptions {
    /// Context lines around each diff hunk.
    pub context_lines: usize,
    /// Appended to a declaration name that is already taken.
    pub rename_suffix: String,
    /// Remediate batch findings on the rayon pool.
    pub parallel: bool,
    /// Re-parse patched documents and reject regressions.
    pub validate: bool,
}

impl Default for RemediationOptions {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            rename_suffix: DEFAULT_RENAME_SUFFIX.to_string(),
            parallel: true,
            validate: true,
        }
    }
}

/// A rewritten document, before validation and diffing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedDocument {
    pub content: String,
    /// Environment variable the command now references.
    pub variable: String,
    pub reused_existing: bool,
    pub inserted_block: bool,
    /// Interpolations replaced in the command block.
    pub replacements: usize,
}

/// Rewrite `content` so the finding's expression flows through an
/// environment variable.
///
/// # Errors
///
/// Any [`RemediationErrorKind`] except `PatchRegression`, wrapped with the
/// finding's identity.
#[instrument(skip(content, options), fields(path = %finding.path, offset = finding.offset))]
pub fn patch_document(
    finding: &Finding,
    content: &str,
    options: &RemediationOptions,
) -> Result<PatchedDocument, RemediationError> {
    patch_document_inner(finding, content, options)
        .map_err(|kind| RemediationError::new(finding, kind))
}

fn patch_document_inner(
    finding: &Finding,
    content: &str,
    options: &RemediationOptions,
) -> Result<PatchedDocument, RemediationErrorKind> {
    let expression = finding.unsafe_expression();
    let mut doc = Document::parse(content);

    let index = line_index(&doc, finding.offset)?;
    let pattern = classify(expression)?;
    let reconciliation = reconcile(&mut doc, pattern, expression, &options.rename_suffix)?;

    let index = reconciliation
        .insertion
        .map_or(index, |insertion| insertion.shift(index));
    let replacements = rewrite_site(&mut doc, index, &reconciliation.pattern)?;

    debug!(
        variable = reconciliation.pattern.name(),
        reused = reconciliation.reused,
        replacements,
        "patched document"
    );

    Ok(PatchedDocument {
        content: doc.render(),
        variable: reconciliation.pattern.name().to_string(),
        reused_existing: reconciliation.reused,
        inserted_block: reconciliation
            .insertion
            .is_some_and(|insertion| insertion.new_block),
        replacements,
    })
}

/// A validated remediation, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Patch {
    pub path: String,
    pub offset: usize,
    pub variable: String,
    /// Unified diff; empty when the document needed no change.
    pub diff: String,
    pub reused_existing: bool,
    pub inserted_block: bool,
}

impl Patch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Patch, validate, and diff one finding.
///
/// `original_diagnostics` are the parser's diagnostics for the unpatched
/// document; only diagnostics beyond those count as regressions.
///
/// # Errors
///
/// Any [`RemediationErrorKind`], wrapped with the finding's identity.
pub fn generate_patch(
    finding: &Finding,
    content: &str,
    original_diagnostics: &[Diagnostic],
    parser: &dyn WorkflowParser,
    options: &RemediationOptions,
) -> Result<Patch, RemediationError> {
    let patched = patch_document(finding, content, options)?;

    if options.validate {
        let regressions = validate(parser, &patched.content, original_diagnostics);
        if !regressions.is_empty() {
            return Err(RemediationError::new(
                finding,
                RemediationErrorKind::PatchRegression {
                    diagnostics: regressions,
                },
            ));
        }
    }

    Ok(Patch {
        path: finding.path.clone(),
        offset: finding.offset,
        diff: unified_diff(&finding.path, content, &patched.content, options.context_lines),
        variable: patched.variable,
        reused_existing: patched.reused_existing,
        inserted_block: patched.inserted_block,
    })
}

/// Result of remediating one finding in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FindingOutcome {
    Patched(Patch),
    Failed(RemediationError),
}

impl FindingOutcome {
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Self::Patched(patch) => patch.offset,
            Self::Failed(error) => error.offset,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Patched(patch) => &patch.path,
            Self::Failed(error) => &error.path,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<Result<Patch, RemediationError>> for FindingOutcome {
    fn from(result: Result<Patch, RemediationError>) -> Self {
        match result {
            Ok(patch) => Self::Patched(patch),
            Err(error) => Self::Failed(error),
        }
    }
}

/// Remediate every finding independently against `content`.
///
/// Each finding gets its own copy of the document, so one failure never
/// affects another. Outcomes come back sorted by offset; findings on the same
/// line keep their input order.
#[must_use]
pub fn remediate_all(
    findings: &[Finding],
    content: &str,
    original_diagnostics: &[Diagnostic],
    parser: &dyn WorkflowParser,
    options: &RemediationOptions,
) -> Vec<FindingOutcome> {
    let start = Instant::now();
    let run = |finding: &Finding| {
        FindingOutcome::from(generate_patch(
            finding,
            content,
            original_diagnostics,
            parser,
            options,
        ))
    };

    let mut outcomes: Vec<FindingOutcome> = if options.parallel {
        findings.par_iter().map(run).collect()
    } else {
        findings.iter().map(run).collect()
    };
    outcomes.sort_by_key(FindingOutcome::offset);

    debug!(
        findings = findings.len(),
        elapsed = ?start.elapsed(),
        "batch remediation finished"
    );
    outcomes
}

/// Counts over a batch of outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub patched: usize,
    /// Patched findings whose diff came out empty.
    pub unchanged: usize,
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn from_outcomes(outcomes: &[FindingOutcome]) -> Self {
        outcomes.iter().fold(Self::default(), |mut summary, outcome| {
            summary.total += 1;
            match outcome {
                FindingOutcome::Patched(patch) if patch.is_empty() => summary.unchanged += 1,
                FindingOutcome::Patched(_) => summary.patched += 1,
                FindingOutcome::Failed(_) => summary.failed += 1,
            }
            summary
        })
    }

    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = "\
name: triage
on:
  issues:
    types: [opened]

jobs:
  greet:
    runs-on: ubuntu-latest
    steps:
      - name: echo title
        run: |
          echo \"${{ github.event.issue.title }}\"
      - name: echo body
        run: echo \"${{ github.event.issue.body }}\"
";

    fn no_diagnostics(_: &str) -> Vec<Diagnostic> {
        Vec::new()
    }

    fn options() -> RemediationOptions {
        RemediationOptions::default()
    }

    // ========================================================================
    // patch_document
    // ========================================================================

    #[test]
    fn new_block_and_rewrite() {
        let finding = Finding::new("ci.yml", 11, "github.event.issue.title");
        let patched = patch_document(&finding, WORKFLOW, &options()).unwrap();
        assert_eq!(patched.variable, "ISSUE_TITLE");
        assert!(patched.inserted_block);
        assert!(!patched.reused_existing);
        assert_eq!(patched.replacements, 1);
        assert!(patched.content.contains(
            "    types: [opened]\n\nenv:\n  ISSUE_TITLE: ${{ github.event.issue.title }}\n\njobs:\n"
        ));
        assert!(patched.content.contains("          echo \"$ISSUE_TITLE\"\n"));
        // the second step is outside the block
        assert!(patched.content.contains("run: echo \"${{ github.event.issue.body }}\""));
    }

    #[test]
    fn snippet_is_trimmed() {
        let finding = Finding::new("ci.yml", 11, "  github.event.issue.title \n");
        assert_eq!(
            patch_document(&finding, WORKFLOW, &options()).unwrap().variable,
            "ISSUE_TITLE"
        );
    }

    #[test]
    fn offset_is_checked_before_classification() {
        let finding = Finding::new("ci.yml", 99, "github.sha");
        let err = patch_document(&finding, WORKFLOW, &options()).unwrap_err();
        assert!(matches!(err.kind(), RemediationErrorKind::InvalidOffset { .. }));
        assert_eq!(err.offset, 99);
    }

    #[test]
    fn unknown_expression() {
        let finding = Finding::new("ci.yml", 11, "github.sha");
        let err = patch_document(&finding, WORKFLOW, &options()).unwrap_err();
        assert_eq!(err.kind().code(), "unknown_dangerous_variable");
    }

    #[test]
    fn custom_rename_suffix() {
        let content = "on: push\nenv:\n  HEAD_REF: main\njobs:\n  a:\n    steps:\n      - run: echo ${{ github.head_ref }}\n";
        let finding = Finding::new("ci.yml", 7, "github.head_ref");
        let opts = RemediationOptions {
            rename_suffix: "_UNTRUSTED".to_string(),
            ..options()
        };
        let patched = patch_document(&finding, content, &opts).unwrap();
        assert_eq!(patched.variable, "HEAD_REF_UNTRUSTED");
        assert!(patched.content.contains("      - run: echo $HEAD_REF_UNTRUSTED\n"));
    }

    // ========================================================================
    // generate_patch
    // ========================================================================

    #[test]
    fn patch_carries_diff() {
        let finding = Finding::new(".github/workflows/triage.yml", 11, "github.event.issue.title");
        let patch = generate_patch(&finding, WORKFLOW, &[], &no_diagnostics, &options()).unwrap();
        assert!(patch.diff.starts_with(
            "diff --git a/.github/workflows/triage.yml b/.github/workflows/triage.yml\n"
        ));
        assert!(patch.diff.contains("+  ISSUE_TITLE: ${{ github.event.issue.title }}\n"));
        assert!(patch.diff.contains("-          echo \"${{ github.event.issue.title }}\"\n"));
        assert!(patch.diff.contains("+          echo \"$ISSUE_TITLE\"\n"));
        assert!(!patch.is_empty());
    }

    #[test]
    fn regression_discards_patch() {
        let parser = |content: &str| {
            if content.contains("ISSUE_TITLE") {
                vec![Diagnostic::new(6, 1, "syntax-check", "boom")]
            } else {
                Vec::new()
            }
        };
        let finding = Finding::new("ci.yml", 11, "github.event.issue.title");
        let err = generate_patch(&finding, WORKFLOW, &[], &parser, &options()).unwrap_err();
        assert!(matches!(
            err.kind(),
            RemediationErrorKind::PatchRegression { diagnostics } if diagnostics.len() == 1
        ));

        let opts = RemediationOptions {
            validate: false,
            ..options()
        };
        assert!(generate_patch(&finding, WORKFLOW, &[], &parser, &opts).is_ok());
    }

    #[test]
    fn preexisting_diagnostics_are_tolerated() {
        let known = Diagnostic::new(3, 5, "syntax-check", "odd. see line 3");
        let parser = |_: &str| vec![Diagnostic::new(6, 5, "syntax-check", "odd. see line 6")];
        let finding = Finding::new("ci.yml", 11, "github.event.issue.title");
        assert!(generate_patch(&finding, WORKFLOW, &[known], &parser, &options()).is_ok());
    }

    // ========================================================================
    // Batch
    // ========================================================================

    #[test]
    fn batch_is_sorted_and_isolated() {
        let findings = vec![
            Finding::new("ci.yml", 14, "github.event.issue.body"),
            Finding::new("ci.yml", 2, "github.sha"),
            Finding::new("ci.yml", 11, "github.event.issue.title"),
        ];
        for parallel in [true, false] {
            let opts = RemediationOptions {
                parallel,
                ..options()
            };
            let outcomes = remediate_all(&findings, WORKFLOW, &[], &no_diagnostics, &opts);
            let offsets: Vec<usize> = outcomes.iter().map(FindingOutcome::offset).collect();
            assert_eq!(offsets, vec![2, 11, 14]);
            assert!(outcomes[0].is_failed());

            let FindingOutcome::Patched(body) = &outcomes[2] else {
                panic!("expected a patch");
            };
            // each patch starts from the original document
            assert!(!body.diff.contains("ISSUE_TITLE"));
            assert_eq!(body.variable, "ISSUE_BODY");

            let summary = BatchSummary::from_outcomes(&outcomes);
            assert_eq!(
                summary,
                BatchSummary {
                    total: 3,
                    patched: 2,
                    unchanged: 0,
                    failed: 1
                }
            );
            assert!(summary.has_failures());
        }
    }

    #[test]
    fn outcome_json_is_tagged() {
        let finding = Finding::new("ci.yml", 2, "github.sha");
        let outcome =
            FindingOutcome::from(generate_patch(&finding, WORKFLOW, &[], &no_diagnostics, &options()));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "unknown_dangerous_variable");
        assert_eq!(outcome.path(), "ci.yml");
    }

    // ========================================================================
    // Properties
    // ========================================================================

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// `on:` then `jobs:` with one single-line step per entry, each
        /// interpolating the issue title. Step `k` is on line `5 + k`.
        fn workflow_with_steps(steps: usize) -> String {
            let mut content = String::from("on: issues\njobs:\n  a:\n    steps:\n");
            for k in 0..steps {
                content.push_str(&format!(
                    "      - run: echo \"${{{{ github.event.issue.title }}}}\" {k}\n"
                ));
            }
            content
        }

        fn names_strategy() -> impl Strategy<Value = Vec<&'static str>> {
            proptest::sample::subsequence(vec!["ISSUE_TITLE", "ISSUE_BODY", "HEAD_REF", "FOO"], 0..=4)
        }

        proptest! {
            /// Only the targeted command changes; the block above `jobs:` is
            /// the only other difference.
            #[test]
            fn rewrite_is_scoped_to_one_step(steps in 1usize..12, pick in 0usize..12) {
                let pick = pick % steps;
                let content = workflow_with_steps(steps);
                let finding = Finding::new("ci.yml", 5 + pick, "github.event.issue.title");
                let patched = patch_document(&finding, &content, &options()).unwrap();

                let original: Vec<&str> = content.lines().collect();
                let mut lines: Vec<&str> = patched.content.lines().collect();
                prop_assert_eq!(lines[1], "env:");
                prop_assert_eq!(lines[2], "  ISSUE_TITLE: ${{ github.event.issue.title }}");
                lines.drain(1..3);
                prop_assert_eq!(lines.len(), original.len());

                for (index, (before, after)) in original.iter().zip(&lines).enumerate() {
                    if index == 4 + pick {
                        prop_assert_eq!(*after, format!("      - run: echo \"$ISSUE_TITLE\" {pick}"));
                    } else {
                        prop_assert_eq!(before, after);
                    }
                }
            }

            /// Unless reused, the chosen variable never shadows an existing entry.
            #[test]
            fn declared_names_stay_unique(names in names_strategy()) {
                let mut content = String::from("on: issues\nenv:\n");
                for name in &names {
                    content.push_str(&format!("  {name}: constant\n"));
                }
                content.push_str("jobs:\n  a:\n    steps:\n      - run: echo ${{ github.event.issue.title }}\n");
                let offset = content.lines().count();

                let finding = Finding::new("ci.yml", offset, "github.event.issue.title");
                let patched = patch_document(&finding, &content, &options()).unwrap();

                prop_assert!(!patched.reused_existing);
                prop_assert!(names.iter().all(|name| *name != patched.variable));
                let declared: Vec<&str> = patched
                    .content
                    .lines()
                    .skip(2)
                    .take(names.len() + 1)
                    .filter_map(|line| line.trim().split_once(':').map(|(name, _)| name))
                    .collect();
                let mut unique = declared.clone();
                unique.sort_unstable();
                unique.dedup();
                prop_assert_eq!(unique.len(), names.len() + 1);
            }

            /// Patching an already patched step changes nothing.
            #[test]
            fn remediation_converges(steps in 1usize..8, pick in 0usize..8) {
                let pick = pick % steps;
                let content = workflow_with_steps(steps);
                let first = patch_document(
                    &Finding::new("ci.yml", 5 + pick, "github.event.issue.title"),
                    &content,
                    &options(),
                )
                .unwrap();
                let second = patch_document(
                    &Finding::new("ci.yml", 7 + pick, "github.event.issue.title"),
                    &first.content,
                    &options(),
                )
                .unwrap();

                prop_assert!(second.reused_existing);
                prop_assert_eq!(second.replacements, 0);
                prop_assert_eq!(second.content, first.content);
            }

            /// Parallel and sequential batches agree.
            #[test]
            fn batch_is_deterministic(offsets in proptest::collection::vec(0usize..16, 0..10)) {
                let content = workflow_with_steps(8);
                let findings: Vec<Finding> = offsets
                    .iter()
                    .map(|&offset| Finding::new("ci.yml", offset, "github.event.issue.title"))
                    .collect();
                let parallel = remediate_all(&findings, &content, &[], &no_diagnostics, &options());
                let sequential = remediate_all(
                    &findings,
                    &content,
                    &[],
                    &no_diagnostics,
                    &RemediationOptions { parallel: false, ..options() },
                );
                prop_assert_eq!(parallel, sequential);
            }
        }
    }
}
