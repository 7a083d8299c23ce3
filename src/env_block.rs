//! Locating the workflow-level `env:` block.
//!
//! The block either already exists (new declarations are appended after its
//! last entry, at its entries' indentation) or is planted right above the
//! top-level `jobs:` label, following the document's own spacing and
//! indentation conventions.

use crate::document::Document;
use crate::error::RemediationErrorKind;
use crate::lines::{
    find_label, find_label_any_indent, indent_of, is_at_or_above_indent, is_blank,
    is_blank_or_comment, is_comment_only,
};

/// Indentation step assumed when the document gives no hint.
pub const DEFAULT_INDENT_STEP: usize = 2;

/// Indentation of the required `on:` block, which defines the top level.
///
/// Almost always 0.
///
/// # Errors
///
/// [`RemediationErrorKind::NoGlobalIndent`] when there is no `on:` label.
pub fn find_global_indent(doc: &Document) -> Result<usize, RemediationErrorKind> {
    let lines = doc.lines();
    find_label_any_indent(lines, "on")
        .map(|index| indent_of(&lines[index]))
        .ok_or(RemediationErrorKind::NoGlobalIndent)
}

/// An `env:` block already present at the top level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExistingBlock {
    /// Line holding the `env:` label.
    pub label_line: usize,
    /// Line a new declaration is inserted at: just after the last entry.
    pub insertion_line: usize,
    /// Indentation of the block's entries, `None` when the block is empty.
    pub declaration_indent: Option<usize>,
}

impl ExistingBlock {
    /// Range of lines between the label and the insertion point.
    #[must_use]
    pub const fn body(&self) -> std::ops::Range<usize> {
        self.label_line + 1..self.insertion_line
    }
}

/// Find the top-level `env:` block, if any.
///
/// Scans forward from the label, skipping blank and comment lines, until the
/// first substantive line at or above `global_indent`. Entry indentation is
/// taken from the first entry; deeper lines are continuations of a
/// multi-line value and still belong to the block.
#[must_use]
pub fn find_existing_block(doc: &Document, global_indent: usize) -> Option<ExistingBlock> {
    let lines = doc.lines();
    let label_line = find_label(lines, "env", global_indent)?;

    let mut insertion_line = label_line + 1;
    let mut declaration_indent = None;
    for (index, line) in lines.iter().enumerate().skip(label_line + 1) {
        if is_blank_or_comment(line) {
            continue;
        }
        if is_at_or_above_indent(line, global_indent) {
            break;
        }
        declaration_indent.get_or_insert_with(|| indent_of(line));
        insertion_line = index + 1;
    }

    Some(ExistingBlock {
        label_line,
        insertion_line,
        declaration_indent,
    })
}

/// Where and how to plant a brand-new `env:` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBlockPlan {
    /// Line of the `jobs:` label; the block is inserted right above it.
    pub jobs_line: usize,
    /// Blank lines to leave between the new block and `jobs:`.
    pub blank_lines: usize,
    /// Indentation step between a label and its children.
    pub indent_step: usize,
}

/// Plan a new `env:` block above the top-level `jobs:` label.
///
/// # Errors
///
/// [`RemediationErrorKind::NoInsertionPoint`] when there is no `jobs:` label
/// at `global_indent`.
pub fn plan_new_block(
    doc: &Document,
    global_indent: usize,
) -> Result<NewBlockPlan, RemediationErrorKind> {
    let lines = doc.lines();
    let jobs_line =
        find_label(lines, "jobs", global_indent).ok_or(RemediationErrorKind::NoInsertionPoint)?;

    Ok(NewBlockPlan {
        jobs_line,
        blank_lines: block_spacing(lines, jobs_line),
        indent_step: indent_step(lines, jobs_line),
    })
}

/// Blank lines between `jobs:` and the end of the preceding block.
/// Comment lines in between are skipped, not counted.
fn block_spacing(lines: &[String], jobs_line: usize) -> usize {
    let mut blanks = 0;
    for line in lines[..jobs_line].iter().rev() {
        if is_blank(line) {
            blanks += 1;
        } else if !is_comment_only(line) {
            break;
        }
    }
    blanks
}

/// Column delta between `jobs:` and the first substantive line below it.
fn indent_step(lines: &[String], jobs_line: usize) -> usize {
    let jobs_indent = indent_of(&lines[jobs_line]);
    lines[jobs_line + 1..]
        .iter()
        .find(|line| !is_blank_or_comment(line))
        .map(|line| indent_of(line))
        .filter(|&indent| indent > jobs_indent)
        .map_or(DEFAULT_INDENT_STEP, |indent| indent - jobs_indent)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_ENV: &str = "\
name: ci
on:
  issues:

env:
  # shared values
  GREETING: hello

  TARGET: world
permissions: read-all

jobs:
  greet:
    runs-on: ubuntu-latest
";

    const WITHOUT_ENV: &str = "\
on:
  pull_request:


# all jobs
jobs:
    check:
        runs-on: ubuntu-latest
";

    // ========================================================================
    // Global indentation
    // ========================================================================

    #[test]
    fn global_indent_from_on_label() {
        assert_eq!(find_global_indent(&Document::parse(WITH_ENV)), Ok(0));
        let nested = Document::parse("  name: x\n  on: push\n  jobs:\n");
        assert_eq!(find_global_indent(&nested), Ok(2));
    }

    #[test]
    fn missing_on_is_an_error() {
        let doc = Document::parse("name: x\njobs:\n");
        assert_eq!(
            find_global_indent(&doc),
            Err(RemediationErrorKind::NoGlobalIndent)
        );
        assert_eq!(
            find_global_indent(&Document::parse("")),
            Err(RemediationErrorKind::NoGlobalIndent)
        );
    }

    // ========================================================================
    // Existing block
    // ========================================================================

    #[test]
    fn existing_block_insertion_after_last_entry() {
        let block = find_existing_block(&Document::parse(WITH_ENV), 0).unwrap();
        assert_eq!(block.label_line, 4);
        // after `  TARGET: world` (line 8), before `permissions:`
        assert_eq!(block.insertion_line, 9);
        assert_eq!(block.declaration_indent, Some(2));
        assert_eq!(block.body(), 5..9);
    }

    #[test]
    fn existing_block_keeps_entry_indent_with_multiline_values() {
        let doc = Document::parse(
            "on: push\nenv:\n    SCRIPT: |\n        echo one\n        echo two\njobs:\n",
        );
        let block = find_existing_block(&doc, 0).unwrap();
        assert_eq!(block.declaration_indent, Some(4));
        assert_eq!(block.insertion_line, 5);
    }

    #[test]
    fn empty_existing_block() {
        let doc = Document::parse("on: push\nenv:\n\njobs:\n");
        let block = find_existing_block(&doc, 0).unwrap();
        assert_eq!(block.insertion_line, 2);
        assert_eq!(block.declaration_indent, None);
        assert!(block.body().is_empty());
    }

    #[test]
    fn job_level_env_is_not_the_global_block() {
        let doc = Document::parse(
            "on: push\njobs:\n  a:\n    env:\n      X: 1\n    runs-on: ubuntu-latest\n",
        );
        assert_eq!(find_existing_block(&doc, 0), None);
    }

    #[test]
    fn block_at_end_of_document() {
        let doc = Document::parse("on: push\njobs:\n  a:\n    runs-on: x\nenv:\n  A: b\n");
        let block = find_existing_block(&doc, 0).unwrap();
        assert_eq!(block.insertion_line, 6);
    }

    // ========================================================================
    // New block planning
    // ========================================================================

    #[test]
    fn plan_new_block_above_jobs() {
        let plan = plan_new_block(&Document::parse(WITHOUT_ENV), 0).unwrap();
        assert_eq!(plan.jobs_line, 5);
        // two blanks, the comment line is skipped but not counted
        assert_eq!(plan.blank_lines, 2);
        assert_eq!(plan.indent_step, 4);
    }

    #[test]
    fn plan_without_spacing() {
        let doc = Document::parse("on: push\njobs:\n  a:\n    runs-on: x\n");
        let plan = plan_new_block(&doc, 0).unwrap();
        assert_eq!(plan.jobs_line, 1);
        assert_eq!(plan.blank_lines, 0);
        assert_eq!(plan.indent_step, 2);
    }

    #[test]
    fn plan_defaults_indent_step_for_empty_jobs() {
        let doc = Document::parse("on: push\n\njobs:\n");
        let plan = plan_new_block(&doc, 0).unwrap();
        assert_eq!(plan.indent_step, DEFAULT_INDENT_STEP);
        assert_eq!(plan.blank_lines, 1);
    }

    #[test]
    fn plan_requires_jobs_label() {
        let doc = Document::parse("on: push\n");
        assert_eq!(
            plan_new_block(&doc, 0),
            Err(RemediationErrorKind::NoInsertionPoint)
        );
    }
}
