//! Workflow-level environment declarations.
//!
//! Decides, for one dangerous expression, whether an existing declaration can
//! be reused, whether the catalog name must be disambiguated, and where the
//! new `NAME: ${{ expression }}` line goes.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::UnsafePattern;
use crate::document::Document;
use crate::env_block::{
    DEFAULT_INDENT_STEP, ExistingBlock, find_existing_block, find_global_indent, plan_new_block,
};
use crate::error::RemediationErrorKind;
use crate::lines::{indent_of, indentation, is_blank_or_comment};

/// Suffix appended to a catalog name already taken by another declaration.
pub const DEFAULT_RENAME_SUFFIX: &str = "_1";

/// `${{ github.… }}` with the inner expression captured.
static SIMPLE_INTERPOLATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*(github\.[^\s]*?)\s*\}\}").ok());

/// One `name: value` line of the workflow-level `env:` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationEntry {
    pub name: String,
    pub value: String,
    pub line: usize,
}

impl DeclarationEntry {
    /// Parse a block line loosely as `name: value`.
    ///
    /// Surrounding quotes on the name or value are dropped, as is a trailing
    /// comment on an unquoted value.
    #[must_use]
    pub fn parse(line: &str, index: usize) -> Option<Self> {
        let (name, value) = line.trim().split_once(':')?;
        let name = unquote(name.trim());
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            value: clean_value(value.trim()).to_string(),
            line: index,
        })
    }

    /// Value used to index the declaration: the inner expression of a simple
    /// `${{ github.… }}` interpolation, otherwise the value verbatim.
    #[must_use]
    pub fn normalized_value(&self) -> &str {
        if !self.value.contains("${{") {
            return &self.value;
        }
        SIMPLE_INTERPOLATION
            .as_ref()
            .and_then(|re| re.captures(&self.value))
            .and_then(|caps| caps.get(1))
            .map_or(self.value.as_str(), |m| m.as_str())
    }
}

fn unquote(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn clean_value(value: &str) -> &str {
    if value.starts_with(['"', '\'']) {
        return unquote(value);
    }
    value
        .find(" #")
        .map_or(value, |comment| value[..comment].trim_end())
}

/// Existing workflow-level declarations, indexed by normalized value.
///
/// Duplicates are allowed; on an exact value collision the last declaration
/// in the document wins.
#[derive(Debug, Clone, Default)]
pub struct ExistingDeclarationIndex {
    by_value: HashMap<String, String>,
    names: HashSet<String>,
    entries: Vec<DeclarationEntry>,
}

impl ExistingDeclarationIndex {
    /// Index the entries of the workflow-level `env:` block.
    #[must_use]
    pub fn build(doc: &Document, global_indent: usize) -> Self {
        find_existing_block(doc, global_indent)
            .map(|block| Self::from_block(doc, &block))
            .unwrap_or_default()
    }

    fn from_block(doc: &Document, block: &ExistingBlock) -> Self {
        let mut index = Self::default();
        let Some(entry_indent) = block.declaration_indent else {
            return index;
        };
        for line_index in block.body() {
            let Some(line) = doc.line(line_index) else {
                continue;
            };
            if is_blank_or_comment(line) || indent_of(line) != entry_indent {
                continue;
            }
            if let Some(entry) = DeclarationEntry::parse(line, line_index) {
                index.insert(entry);
            }
        }
        index
    }

    fn insert(&mut self, entry: DeclarationEntry) {
        self.by_value
            .insert(entry.normalized_value().to_string(), entry.name.clone());
        self.names.insert(entry.name.clone());
        self.entries.push(entry);
    }

    /// Name of the declaration already holding `expression`.
    #[must_use]
    pub fn lookup(&self, expression: &str) -> Option<&str> {
        self.by_value.get(expression).map(String::as_str)
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    #[must_use]
    pub fn entries(&self) -> &[DeclarationEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lines added to the document by a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// Index of the first inserted line.
    pub at: usize,
    /// Number of inserted lines.
    pub count: usize,
    /// Whether a new `env:` block was created.
    pub new_block: bool,
}

impl Insertion {
    /// Where a line that was at `index` before the insertion is now.
    #[must_use]
    pub const fn shift(&self, index: usize) -> usize {
        if index >= self.at {
            index + self.count
        } else {
            index
        }
    }
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The pattern, renamed to the variable the command should reference.
    pub pattern: UnsafePattern,
    /// An existing declaration already held the expression.
    pub reused: bool,
    /// Lines inserted into the document, if any.
    pub insertion: Option<Insertion>,
}

/// Make sure a workflow-level declaration holds `expression`.
///
/// In order:
/// 1. an existing declaration with the same value is reused as-is;
/// 2. a declaration already named like the pattern forces a rename with
///    `rename_suffix` (a single attempt, no counter);
/// 3. `NAME: ${{ expression }}` is appended to the existing block, or a new
///    block is planted right above `jobs:`.
///
/// # Errors
///
/// [`RemediationErrorKind::NoGlobalIndent`] without an `on:` block,
/// [`RemediationErrorKind::NoInsertionPoint`] when a new block is needed and
/// there is no `jobs:` label.
pub fn reconcile(
    doc: &mut Document,
    pattern: UnsafePattern,
    expression: &str,
    rename_suffix: &str,
) -> Result<Reconciliation, RemediationErrorKind> {
    let global_indent = find_global_indent(doc)?;
    let existing = ExistingDeclarationIndex::build(doc, global_indent);

    if let Some(name) = existing.lookup(expression) {
        tracing::debug!(%name, "reusing existing declaration");
        return Ok(Reconciliation {
            pattern: pattern.renamed(name),
            reused: true,
            insertion: None,
        });
    }

    let pattern = if existing.contains_name(pattern.name()) {
        let name = format!("{}{rename_suffix}", pattern.name());
        tracing::debug!(taken = pattern.name(), %name, "declaration name in use, renaming");
        pattern.renamed(name)
    } else {
        pattern
    };

    let declaration = format!("{}: ${{{{ {expression} }}}}", pattern.name());
    let insertion = match find_existing_block(doc, global_indent) {
        Some(block) => {
            let indent = match block.declaration_indent {
                Some(indent) => indent,
                None => {
                    global_indent
                        + plan_new_block(doc, global_indent)
                            .map_or(DEFAULT_INDENT_STEP, |plan| plan.indent_step)
                }
            };
            let line = format!("{}{declaration}", indentation(indent));
            let count = doc.insert_lines(block.insertion_line, [line]);
            Insertion {
                at: block.insertion_line,
                count,
                new_block: false,
            }
        }
        None => {
            let plan = plan_new_block(doc, global_indent)?;
            let mut block = Vec::with_capacity(2 + plan.blank_lines);
            block.push(format!("{}env:", indentation(global_indent)));
            block.push(format!(
                "{}{declaration}",
                indentation(global_indent + plan.indent_step)
            ));
            block.extend(std::iter::repeat_n(String::new(), plan.blank_lines));
            let count = doc.insert_lines(plan.jobs_line, block);
            Insertion {
                at: plan.jobs_line,
                count,
                new_block: true,
            }
        }
    };

    Ok(Reconciliation {
        pattern,
        reused: false,
        insertion: Some(insertion),
    })
}
