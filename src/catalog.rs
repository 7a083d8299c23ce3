//! Catalog of attacker-controlled workflow expressions.
//!
//! Each entry maps a dangerous `github.*` context expression to the
//! environment variable name the remediation introduces for it. The catalog
//! is an ordered list scanned front to back: the first entry whose expression
//! pattern matches the snippet wins, so entry order encodes precedence.
//!
//! Array-indexed expressions (`github.event.commits[0].message`) get a
//! derived pattern: the index is appended to the variable name and the
//! generic subscript-tolerant regex is replaced by the exact, escaped
//! expression so `commits[0]` and `commits[1]` never share a variable.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::RemediationErrorKind;

/// A static catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// Environment variable name used for the safe value.
    pub name: &'static str,
    /// Regex identifying the bare expression.
    pub expression: &'static str,
}

macro_rules! unsafe_expression {
    ($name:literal, $re:literal) => {
        CatalogEntry {
            name: $name,
            expression: $re,
        }
    };
}

const ENTRIES: &[CatalogEntry] = &[
    unsafe_expression!("AUTHOR_EMAIL", r"github\.event\.commits.*?\.author\.email"),
    unsafe_expression!("AUTHOR_EMAIL", r"github\.event\.head_commit\.author\.email"),
    unsafe_expression!("AUTHOR_NAME", r"github\.event\.commits.*?\.author\.name"),
    unsafe_expression!("AUTHOR_NAME", r"github\.event\.head_commit\.author\.name"),
    unsafe_expression!("COMMENT_BODY", r"github\.event\.comment\.body"),
    unsafe_expression!("COMMIT_MESSAGE", r"github\.event\.commits.*?\.message"),
    unsafe_expression!("COMMIT_MESSAGE", r"github\.event\.head_commit\.message"),
    unsafe_expression!("DISCUSSION_TITLE", r"github\.event\.discussion\.title"),
    unsafe_expression!("DISCUSSION_BODY", r"github\.event\.discussion\.body"),
    unsafe_expression!("ISSUE_BODY", r"github\.event\.issue\.body"),
    unsafe_expression!("ISSUE_COMMENT_BODY", r"github\.event\.issue_comment\.comment\.body"),
    unsafe_expression!("ISSUE_TITLE", r"github\.event\.issue\.title"),
    unsafe_expression!("PAGE_NAME", r"github\.event\.pages.*?\.page_name"),
    unsafe_expression!("PR_BODY", r"github\.event\.pull_request\.body"),
    unsafe_expression!(
        "PR_DEFAULT_BRANCH",
        r"github\.event\.pull_request\.head\.repo\.default_branch"
    ),
    unsafe_expression!("PR_HEAD_LABEL", r"github\.event\.pull_request\.head\.label"),
    unsafe_expression!("PR_HEAD_REF", r"github\.event\.pull_request\.head\.ref"),
    unsafe_expression!("PR_TITLE", r"github\.event\.pull_request\.title"),
    unsafe_expression!("REVIEW_BODY", r"github\.event\.review\.body"),
    unsafe_expression!("REVIEW_COMMENT_BODY", r"github\.event\.review_comment\.body"),
    unsafe_expression!("HEAD_REF", r"github\.head_ref"),
];

/// Compiled catalog, in precedence order.
static CATALOG: LazyLock<Vec<UnsafePattern>> = LazyLock::new(|| {
    ENTRIES
        .iter()
        .filter_map(|entry| match UnsafePattern::new(entry.name, entry.expression) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::error!(name = entry.name, error = %e, "catalog pattern failed to compile");
                None
            }
        })
        .collect()
});

/// Any run of characters inside `{{ ... }}` that does not close it.
const INTERPOLATION_BODY: &str = r"(?:[^}]|\}[^}])*?";

/// First `[...]` subscript of an expression.
static ARRAY_INDEX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(.+?)\]").ok());

/// The ordered catalog entries.
#[must_use]
pub fn catalog() -> &'static [CatalogEntry] {
    ENTRIES
}

/// A dangerous expression and how to find and replace it.
#[derive(Debug, Clone)]
pub struct UnsafePattern {
    name: String,
    detect: Regex,
    wrapper: Regex,
}

impl UnsafePattern {
    /// Build a pattern from a variable name and an expression regex.
    ///
    /// The wrapper regex spans from the interpolation's `{{` to its `}}`, so
    /// the leading `$` of `${{ ... }}` survives a replacement and the rewritten
    /// command reads `$NAME`. It never crosses a `}}`, so neighbouring
    /// interpolations on the same line are left alone.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `expression` is not a valid pattern.
    pub fn new(name: impl Into<String>, expression: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            detect: Regex::new(expression)?,
            wrapper: Regex::new(&format!(
                r"\{{\{{\s*{INTERPOLATION_BODY}{expression}{INTERPOLATION_BODY}\s*\}}\}}"
            ))?,
        })
    }

    /// Environment variable name the expression is bound to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Regex matching the bare expression.
    #[must_use]
    pub const fn detect_regex(&self) -> &Regex {
        &self.detect
    }

    /// Regex matching a whole `{{ ... }}` interpolation containing the expression.
    #[must_use]
    pub const fn wrapper_regex(&self) -> &Regex {
        &self.wrapper
    }

    #[must_use]
    pub fn is_match(&self, expression: &str) -> bool {
        self.detect.is_match(expression)
    }

    /// Same matchers, different variable name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Find the catalog pattern for a dangerous expression.
///
/// # Errors
///
/// Returns [`RemediationErrorKind::UnknownDangerousVariable`] when no entry
/// matches.
pub fn classify(expression: &str) -> Result<UnsafePattern, RemediationErrorKind> {
    let unknown = || RemediationErrorKind::UnknownDangerousVariable {
        expression: expression.to_string(),
    };

    let pattern = CATALOG
        .iter()
        .find(|p| p.is_match(expression))
        .ok_or_else(unknown)?;

    let index = ARRAY_INDEX
        .as_ref()
        .and_then(|re| re.captures(expression))
        .and_then(|caps| caps.get(1));

    let Some(index) = index else {
        return Ok(pattern.clone());
    };

    let name = format!("{}_{}", pattern.name, index.as_str());
    tracing::debug!(%name, "array-indexed expression, deriving exact pattern");
    UnsafePattern::new(name, &regex::escape(expression)).map_err(|_| unknown())
}
