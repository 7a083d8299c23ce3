//! Unified diff rendering.
//!
//! The output is directly consumable by `git apply` and `patch -p1`.

use similar::TextDiff;

/// Context lines around each hunk when nothing else is configured.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Repository-relative form of `path` for diff headers.
fn diff_path(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    path.trim_start_matches('/')
}

/// Unified diff turning `original` into `patched`, with `git`-style headers
/// for `path`.
///
/// Identical inputs produce an empty string.
#[must_use]
pub fn unified_diff(path: &str, original: &str, patched: &str, context_lines: usize) -> String {
    if original == patched {
        return String::new();
    }

    let path = diff_path(path);
    let diff = TextDiff::from_lines(original, patched);
    let body = diff
        .unified_diff()
        .context_radius(context_lines)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string();

    format!("diff --git a/{path} b/{path}\n{body}")
}
