//! Structured logging of remediation outcomes.
//!
//! One record per remediated finding, appended to a log file in text or JSON
//! lines format. Diagnostics about the engine itself go through `tracing`;
//! this log is the audit trail of what was patched and what was not.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::finding::Finding;
use crate::remediate::FindingOutcome;

// ============================================================================
// Configuration Types
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether structured logging is enabled.
    pub enabled: bool,
    /// Path to log file. Supports ~ expansion.
    pub file: Option<String>,
    /// Output format: "text" or "json".
    pub format: LogFormat,
    /// Snippet redaction.
    pub redaction: RedactionMode,
    /// Outcomes to log.
    pub events: LogEventFilter,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            format: LogFormat::Text,
            redaction: RedactionMode::None,
            events: LogEventFilter::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// How much of a finding's snippet reaches the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    #[default]
    None,
    Full,
}

/// Filter for which outcomes to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub patched: bool,
    pub failed: bool,
    pub unchanged: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            patched: true,
            failed: true,
            unchanged: false,
        }
    }
}

// ============================================================================
// Log Entry
// ============================================================================

/// What happened to one finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutcome {
    Patched,
    Failed,
    /// Remediated, but the document came out identical.
    Unchanged,
}

impl LogOutcome {
    #[must_use]
    pub fn of(outcome: &FindingOutcome) -> Self {
        match outcome {
            FindingOutcome::Patched(patch) if patch.is_empty() => Self::Unchanged,
            FindingOutcome::Patched(_) => Self::Patched,
            FindingOutcome::Failed(_) => Self::Failed,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Patched => "PATCHED",
            Self::Failed => "FAILED",
            Self::Unchanged => "UNCHANGED",
        }
    }
}

/// A structured log record for one remediated finding.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub outcome: LogOutcome,
    pub path: String,
    pub offset: usize,
    pub snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_us: Option<u64>,
}

impl LogEntry {
    #[must_use]
    pub fn from_outcome(
        finding: &Finding,
        outcome: &FindingOutcome,
        redaction: RedactionMode,
        elapsed_us: Option<u64>,
    ) -> Self {
        let (variable, error) = match outcome {
            FindingOutcome::Patched(patch) => (Some(patch.variable.clone()), None),
            FindingOutcome::Failed(err) => (None, Some(err.kind().to_string())),
        };

        Self {
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            outcome: LogOutcome::of(outcome),
            path: finding.path.clone(),
            offset: finding.offset,
            snippet: redact_snippet(finding.unsafe_expression(), redaction),
            variable,
            error,
            elapsed_us,
        }
    }

    /// Format as text log line.
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut parts = Vec::with_capacity(6);
        parts.push(format!("[{}]", self.timestamp));
        parts.push(self.outcome.label().to_string());
        parts.push(format!("{}:{}", self.path, self.offset));
        parts.push(format!("\"{}\"", self.snippet));
        if let Some(ref variable) = self.variable {
            parts.push(format!("-> ${variable}"));
        }
        if let Some(ref error) = self.error {
            parts.push(format!("-- {error}"));
        }
        if let Some(us) = self.elapsed_us {
            parts.push(format!("({us}us)"));
        }
        parts.join(" ")
    }

    /// Format as JSON line.
    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Logger
// ============================================================================

/// Appends remediation records to the configured log file.
pub struct RemediationLogger {
    config: LoggingConfig,
    writer: Option<Mutex<BufWriter<File>>>,
}

impl RemediationLogger {
    /// Create a new logger from configuration.
    ///
    /// Returns `None` when logging is disabled.
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let writer = config.file.as_ref().and_then(|path| {
            let expanded = expand_tilde(path);
            match open_log_file(&expanded) {
                Ok(file) => Some(Mutex::new(BufWriter::new(file))),
                Err(e) => {
                    tracing::warn!(path = %expanded, error = %e, "cannot open remediation log");
                    None
                }
            }
        });
        Some(Self {
            config: config.clone(),
            writer,
        })
    }

    /// Record the outcome for one finding.
    pub fn log(&self, finding: &Finding, outcome: &FindingOutcome, elapsed_us: Option<u64>) {
        if !self.should_log(LogOutcome::of(outcome)) {
            return;
        }
        let entry = LogEntry::from_outcome(finding, outcome, self.config.redaction, elapsed_us);
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Some(ref writer) = self.writer {
            if let Ok(mut w) = writer.lock() {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    const fn should_log(&self, outcome: LogOutcome) -> bool {
        match outcome {
            LogOutcome::Patched => self.config.events.patched,
            LogOutcome::Failed => self.config.events.failed,
            LogOutcome::Unchanged => self.config.events.unchanged,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

fn open_log_file(path: &str) -> std::io::Result<File> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn redact_snippet(snippet: &str, mode: RedactionMode) -> String {
    match mode {
        RedactionMode::None => snippet.to_string(),
        RedactionMode::Full => "[REDACTED]".to_string(),
    }
}
