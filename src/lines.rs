//! Indentation-aware line model for workflow documents.
//!
//! The remediation engine never builds a YAML AST. Block boundaries are
//! recovered from indentation alone:
//!
//! ```text
//! jobs:
//!   build:                     indent 2
//!     runs-on: ubuntu-latest   indent 4  ┐
//!     steps:                   indent 4  │ belong to `build`
//!       - run: echo hi         indent 8  ┘ (dash counts as indentation)
//!   test:                      indent 2  <- at or above `build`, block ends
//! ```
//!
//! Blank lines and comment-only lines never terminate a block.

/// Indentation of a line: the count of leading spaces and dashes.
///
/// List-item markers are structural indentation in a workflow, so
/// `      - run: echo` has the same indentation as its sibling keys.
#[inline]
#[must_use]
pub fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '-']).len()
}

/// Whitespace-only (or empty) line.
#[inline]
#[must_use]
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Line holding nothing but a comment.
#[inline]
#[must_use]
pub fn is_comment_only(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

#[inline]
#[must_use]
pub fn is_blank_or_comment(line: &str) -> bool {
    is_blank(line) || is_comment_only(line)
}

/// Returns true when a substantive line sits at or above `reference_indent`,
/// i.e. it closes any block opened deeper than that indentation.
///
/// Blank and comment-only lines always return false.
#[inline]
#[must_use]
pub fn is_at_or_above_indent(line: &str, reference_indent: usize) -> bool {
    !is_blank_or_comment(line) && indent_of(line) <= reference_indent
}

/// Matches a `label:` key starting exactly at column `indent`.
///
/// `"  env:"` matches `("env", 2)` but neither `("env", 0)` nor `("env", 4)`.
#[must_use]
pub fn is_label(line: &str, label: &str, indent: usize) -> bool {
    let bytes = line.as_bytes();
    if bytes.len() < indent || !bytes[..indent].iter().all(|&b| b == b' ') {
        return false;
    }
    line[indent..]
        .strip_prefix(label)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Index of the first line carrying `label:` at exactly `indent`.
#[must_use]
pub fn find_label<S: AsRef<str>>(lines: &[S], label: &str, indent: usize) -> Option<usize> {
    lines
        .iter()
        .position(|line| is_label(line.as_ref(), label, indent))
}

/// Index of the first line carrying `label:` after any leading whitespace.
#[must_use]
pub fn find_label_any_indent<S: AsRef<str>>(lines: &[S], label: &str) -> Option<usize> {
    lines.iter().position(|line| {
        line.as_ref()
            .trim_start()
            .strip_prefix(label)
            .is_some_and(|rest| rest.starts_with(':'))
    })
}

/// A run of `width` spaces.
#[must_use]
pub fn indentation(width: usize) -> String {
    " ".repeat(width)
}
