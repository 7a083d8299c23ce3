//! Structural workflow parser used to validate patches.
//!
//! This is not a full workflow linter. It reports the problems a textual
//! patch can plausibly introduce: YAML that no longer parses, a document that
//! lost its top-level shape, environment names that are not valid shell
//! identifiers, and `${{` interpolations left unclosed.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::lines::{find_label_any_indent, indent_of, is_blank_or_comment, is_comment_only};
use crate::validate::{Diagnostic, WorkflowParser};

pub const KIND_SYNTAX: &str = "syntax-check";
pub const KIND_ENV_VAR: &str = "env-var";
pub const KIND_EXPRESSION: &str = "expression";

static ENV_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

/// [`WorkflowParser`] backed by `serde_yaml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlWorkflowParser;

impl YamlWorkflowParser {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl WorkflowParser for YamlWorkflowParser {
    fn parse(&self, content: &str) -> Vec<Diagnostic> {
        let lines: Vec<&str> = content.split('\n').collect();
        if lines.iter().all(|line| is_blank_or_comment(line)) {
            return vec![Diagnostic::new(1, 1, KIND_SYNTAX, "workflow is empty")];
        }

        let mut diagnostics = unterminated_expressions(&lines);

        match serde_yaml::from_str::<Value>(content) {
            Ok(root) => check_structure(&root, &lines, &mut diagnostics),
            Err(e) => diagnostics.push(yaml_error(&e)),
        }

        diagnostics.sort_by_key(|d| (d.line, d.column));
        tracing::trace!(count = diagnostics.len(), "parsed workflow");
        diagnostics
    }
}

fn yaml_error(e: &serde_yaml::Error) -> Diagnostic {
    let text = e.to_string();
    let problem = text.find(" at line ").map_or(text.as_str(), |pos| &text[..pos]);
    let (line, column) = e
        .location()
        .map_or((1, 1), |loc| (loc.line().max(1), loc.column().max(1)));
    Diagnostic::new(
        line,
        column,
        KIND_SYNTAX,
        format!("could not parse as YAML: {problem}"),
    )
}

fn check_structure(root: &Value, lines: &[&str], diagnostics: &mut Vec<Diagnostic>) {
    let Some(root) = root.as_mapping() else {
        diagnostics.push(Diagnostic::new(
            1,
            1,
            KIND_SYNTAX,
            "workflow is not a mapping. top-level keys such as \"on\" and \"jobs\" are required",
        ));
        return;
    };

    for key in ["on", "jobs"] {
        if !root.contains_key(key) {
            diagnostics.push(Diagnostic::new(
                1,
                1,
                KIND_SYNTAX,
                format!("\"{key}\" section is missing in workflow"),
            ));
        }
    }

    check_env(root.get("env"), lines, diagnostics);

    let Some(jobs) = root.get("jobs") else {
        return;
    };
    let Some(jobs) = jobs.as_mapping() else {
        let (line, column) = locate_key(lines, "jobs");
        diagnostics.push(Diagnostic::new(
            line,
            column,
            KIND_SYNTAX,
            "\"jobs\" section must be a mapping",
        ));
        return;
    };

    for job in jobs.values().filter_map(Value::as_mapping) {
        check_env(job.get("env"), lines, diagnostics);
        let steps = job.get("steps").and_then(Value::as_sequence);
        for step in steps.into_iter().flatten().filter_map(Value::as_mapping) {
            check_env(step.get("env"), lines, diagnostics);
        }
    }
}

fn check_env(env: Option<&Value>, lines: &[&str], diagnostics: &mut Vec<Diagnostic>) {
    let Some(env) = env.and_then(Value::as_mapping) else {
        return;
    };
    for name in env_names(env) {
        let valid = ENV_NAME.as_ref().is_some_and(|re| re.is_match(&name));
        if valid {
            continue;
        }
        let (line, column) = locate_key(lines, &name);
        diagnostics.push(Diagnostic::new(
            line,
            column,
            KIND_ENV_VAR,
            format!("environment variable name {name:?} is invalid. it must match [A-Za-z_][A-Za-z0-9_]*"),
        ));
    }
}

fn env_names(env: &Mapping) -> Vec<String> {
    env.keys()
        .map(|key| match key {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => String::new(),
        })
        .collect()
}

/// 1-based position of the first `key:` label, or the document start.
fn locate_key(lines: &[&str], key: &str) -> (usize, usize) {
    find_label_any_indent(lines, key).map_or((1, 1), |index| {
        (index + 1, indent_of(lines[index]) + 1)
    })
}

fn unterminated_expressions(lines: &[&str]) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if is_comment_only(line) {
            continue;
        }
        let mut rest = 0;
        while let Some(pos) = line[rest..].find("${{") {
            let start = rest + pos;
            let body = start + 3;
            match line[body..].find("}}") {
                Some(end) => rest = body + end + 2,
                None => {
                    diagnostics.push(Diagnostic::new(
                        index + 1,
                        start + 1,
                        KIND_EXPRESSION,
                        "expression is not closed with \"}}\"",
                    ));
                    break;
                }
            }
        }
    }
    diagnostics
}
