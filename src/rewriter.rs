//! Rewriting the injection site.
//!
//! Every `${{ ... }}` interpolation of the dangerous expression inside the
//! offending command block becomes a plain `$NAME` shell variable reference.
//! Nothing outside the block is touched.

use std::ops::Range;

use memchr::memmem;
use regex::NoExpand;

use crate::catalog::UnsafePattern;
use crate::document::Document;
use crate::error::RemediationErrorKind;
use crate::lines::{indent_of, is_at_or_above_indent};

/// Lines of the command block that starts at `start` (0-based).
///
/// The block runs until the first substantive line at or above the starting
/// line's indentation, so a sibling step or key ends it. Returns an empty
/// range when `start` is out of bounds.
#[must_use]
pub fn command_block(doc: &Document, start: usize) -> Range<usize> {
    let lines = doc.lines();
    let Some(first) = lines.get(start) else {
        return start..start;
    };
    let indent = indent_of(first);
    let end = lines[start + 1..]
        .iter()
        .position(|line| is_at_or_above_indent(line, indent))
        .map_or(lines.len(), |pos| start + 1 + pos);
    start..end
}

/// Convert a 1-based finding offset into a line index.
///
/// # Errors
///
/// [`RemediationErrorKind::InvalidOffset`] when the offset is 0 or past the
/// last line.
pub fn line_index(doc: &Document, offset: usize) -> Result<usize, RemediationErrorKind> {
    match offset.checked_sub(1) {
        Some(index) if index < doc.len() => Ok(index),
        _ => Err(RemediationErrorKind::InvalidOffset {
            offset,
            line_count: doc.len(),
        }),
    }
}

/// Replace every interpolation of `pattern` in the command block starting at
/// line `index` with the pattern's variable name.
///
/// Returns the number of replacements made.
///
/// # Errors
///
/// [`RemediationErrorKind::InvalidOffset`] when `index` is outside the document.
pub fn rewrite_site(
    doc: &mut Document,
    index: usize,
    pattern: &UnsafePattern,
) -> Result<usize, RemediationErrorKind> {
    if index >= doc.len() {
        return Err(RemediationErrorKind::InvalidOffset {
            offset: index + 1,
            line_count: doc.len(),
        });
    }

    let finder = memmem::Finder::new("{{");
    let mut replaced = 0;
    for line_index in command_block(doc, index) {
        let Some(line) = doc.line(line_index) else {
            continue;
        };
        if finder.find(line.as_bytes()).is_none() {
            continue;
        }
        let count = pattern.wrapper_regex().find_iter(line).count();
        if count == 0 {
            continue;
        }
        let rewritten = pattern
            .wrapper_regex()
            .replace_all(line, NoExpand(pattern.name()))
            .into_owned();
        doc.replace_line(line_index, rewritten);
        replaced += count;
    }

    tracing::trace!(index, replaced, name = pattern.name(), "rewrote command block");
    Ok(replaced)
}
