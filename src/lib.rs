#![forbid(unsafe_code)]
//! Workflow Injection Fixer (wif) library.
//!
//! This library remediates script injection in CI workflows: an
//! attacker-controlled `${{ github.* }}` expression interpolated straight into
//! a `run:` command is moved into a workflow-level `env:` declaration and the
//! command references the variable instead. The result is a unified diff.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Finding (path, line, snippet)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Unsafe-Expression Catalog                        │
//! │  ordered patterns, first match wins, array index → exact match  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Declaration Manager                             │
//! │  reuse existing entry → rename on collision → insert entry       │
//! │  (env block locator + indentation line model)                    │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Injection-Site Rewriter                         │
//! │  `${{ expr }}` → `$NAME`, scoped to the command block            │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │   Validator (re-parse, no new diagnostics) → Unified Diff       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use workflow_injection_fixer::{Finding, RemediationOptions, YamlWorkflowParser, generate_patch};
//! use workflow_injection_fixer::validate::WorkflowParser;
//!
//! let workflow = "\
//! on: issues
//! jobs:
//!   greet:
//!     runs-on: ubuntu-latest
//!     steps:
//!       - run: echo \"${{ github.event.issue.title }}\"
//! ";
//! let parser = YamlWorkflowParser::new();
//! let original = parser.parse(workflow);
//! let finding = Finding::new(".github/workflows/greet.yml", 6, "github.event.issue.title");
//!
//! let patch = generate_patch(&finding, workflow, &original, &parser, &RemediationOptions::default())
//!     .expect("remediable");
//! assert_eq!(patch.variable, "ISSUE_TITLE");
//! assert!(patch.diff.contains("+      - run: echo \"$ISSUE_TITLE\""));
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod declarations;
pub mod diff;
pub mod document;
pub mod env_block;
pub mod error;
pub mod finding;
pub mod lines;
pub mod logging;
pub mod parser;
pub mod remediate;
pub mod rewriter;
pub mod validate;

pub use catalog::{CatalogEntry, UnsafePattern, catalog, classify};
pub use config::Config;
pub use document::Document;
pub use error::{RemediationError, RemediationErrorKind};
pub use finding::Finding;
pub use parser::YamlWorkflowParser;
pub use remediate::{
    BatchSummary, FindingOutcome, Patch, PatchedDocument, RemediationOptions, generate_patch,
    patch_document, remediate_all,
};
pub use validate::{Diagnostic, WorkflowParser};
