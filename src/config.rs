//! Configuration system for wif.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. Project config (.wif.toml in repo root)
//! 3. User config (~/.config/wif/config.toml)
//! 4. System config (/etc/wif/config.toml)
//! 5. Compiled defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::declarations::DEFAULT_RENAME_SUFFIX;
use crate::diff::DEFAULT_CONTEXT_LINES;
use crate::logging::LoggingConfig;
use crate::remediate::RemediationOptions;

/// Environment variable prefix for all config options.
const ENV_PREFIX: &str = "WIF";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
pub const PROJECT_CONFIG_NAME: &str = ".wif.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,

    /// Remediation engine settings.
    pub remediation: RemediationConfig,

    /// Structured remediation log.
    pub logging: LoggingConfig,
}

/// General configuration options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Color output mode: "auto", "always", "never".
    pub color: String,

    /// Whether to show verbose output.
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: "auto".to_string(),
            verbose: false,
        }
    }
}

/// Remediation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Context lines around each diff hunk.
    pub context_lines: usize,

    /// Suffix for a declaration name that is already taken.
    pub rename_suffix: String,

    /// Remediate batch findings in parallel.
    pub parallel: bool,

    /// Reject patches that introduce new parse diagnostics.
    pub validate: bool,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            context_lines: DEFAULT_CONTEXT_LINES,
            rename_suffix: DEFAULT_RENAME_SUFFIX.to_string(),
            parallel: true,
            validate: true,
        }
    }
}

impl From<&RemediationConfig> for RemediationOptions {
    fn from(config: &RemediationConfig) -> Self {
        Self {
            context_lines: config.context_lines,
            rename_suffix: config.rename_suffix.clone(),
            parallel: config.parallel,
            validate: config.validate,
        }
    }
}

/// Resolved color preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (.wif.toml)
    /// 3. User config (~/.config/wif/config.toml)
    /// 4. System config (/etc/wif/config.toml)
    /// 5. Compiled defaults
    #[must_use]
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(system_config) = Self::load_system_config() {
            config.merge(system_config);
        }

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config() {
            config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load configuration from a specific file.
    ///
    /// A file that exists but does not parse is reported and skipped.
    #[must_use]
    pub fn load_from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config file");
                None
            }
        }
    }

    fn load_system_config() -> Option<Self> {
        let path = PathBuf::from("/etc/wif").join(CONFIG_FILE_NAME);
        Self::load_from_file(&path)
    }

    fn load_user_config() -> Option<Self> {
        Self::load_from_file(&Self::user_config_path()?)
    }

    /// Find `.wif.toml` in the current directory or a parent, stopping at the
    /// repository root.
    fn load_project_config() -> Option<Self> {
        let mut current = env::current_dir().ok()?;

        loop {
            let config_path = current.join(PROJECT_CONFIG_NAME);
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }

            if current.join(".git").exists() {
                return None;
            }

            if !current.pop() {
                break;
            }
        }

        None
    }

    /// Path of the user config file, whether or not it exists.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("wif").join(CONFIG_FILE_NAME))
    }

    /// Merge another config into this one (other takes priority).
    ///
    /// A field only overrides when it differs from the compiled default, so a
    /// file that leaves a key out never resets a lower layer.
    pub fn merge(&mut self, other: Self) {
        let general = GeneralConfig::default();
        if other.general.color != general.color {
            self.general.color = other.general.color;
        }
        if other.general.verbose {
            self.general.verbose = true;
        }

        let remediation = RemediationConfig::default();
        if other.remediation.context_lines != remediation.context_lines {
            self.remediation.context_lines = other.remediation.context_lines;
        }
        if other.remediation.rename_suffix != remediation.rename_suffix {
            self.remediation.rename_suffix = other.remediation.rename_suffix;
        }
        if other.remediation.parallel != remediation.parallel {
            self.remediation.parallel = other.remediation.parallel;
        }
        if other.remediation.validate != remediation.validate {
            self.remediation.validate = other.remediation.validate;
        }

        let logging = LoggingConfig::default();
        if other.logging.enabled {
            self.logging.enabled = true;
        }
        if other.logging.file.is_some() {
            self.logging.file = other.logging.file;
        }
        if other.logging.format != logging.format {
            self.logging.format = other.logging.format;
        }
        if other.logging.redaction != logging.redaction {
            self.logging.redaction = other.logging.redaction;
        }
        if other.logging.events != logging.events {
            self.logging.events = other.logging.events;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| env::var(name).ok());
    }

    /// Apply `WIF_*` overrides read through `lookup`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}_{suffix}"));

        // WIF_VERBOSE=1
        if var("VERBOSE").is_some() {
            self.general.verbose = true;
        }

        // WIF_COLOR=never
        if let Some(color) = var("COLOR") {
            self.general.color = color;
        }

        // WIF_CONTEXT_LINES=5
        if let Some(lines) = var("CONTEXT_LINES") {
            match lines.trim().parse() {
                Ok(lines) => self.remediation.context_lines = lines,
                Err(e) => tracing::warn!(value = %lines, error = %e, "ignoring WIF_CONTEXT_LINES"),
            }
        }

        // WIF_RENAME_SUFFIX=_UNTRUSTED
        if let Some(suffix) = var("RENAME_SUFFIX") {
            self.remediation.rename_suffix = suffix;
        }

        // WIF_LOG_FILE=~/.local/share/wif/remediation.log
        if let Some(file) = var("LOG_FILE") {
            self.logging.enabled = true;
            self.logging.file = Some(file);
        }
    }

    /// Engine options for this configuration.
    #[must_use]
    pub fn remediation_options(&self) -> RemediationOptions {
        RemediationOptions::from(&self.remediation)
    }

    /// Parsed color preference; anything unrecognized means "auto".
    #[must_use]
    pub fn color_mode(&self) -> ColorMode {
        match self.general.color.to_ascii_lowercase().as_str() {
            "always" => ColorMode::Always,
            "never" => ColorMode::Never,
            _ => ColorMode::Auto,
        }
    }

    /// Generate a sample configuration string with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        r#"# wif configuration
#
# Layers, lowest to highest priority: /etc/wif/config.toml,
# ~/.config/wif/config.toml, .wif.toml in the repository, WIF_* variables.

[general]
# Color output: "auto" | "always" | "never"
color = "auto"

# Verbose output (engine tracing on stderr)
verbose = false

#─────────────────────────────────────────────────────────────
# REMEDIATION
#─────────────────────────────────────────────────────────────

[remediation]
# Context lines around each diff hunk
context_lines = 3

# Appended to a variable name already used by another env entry,
# e.g. PR_TITLE -> PR_TITLE_1
rename_suffix = "_1"

# Remediate batch findings in parallel
parallel = true

# Re-parse each patched workflow and reject patches that add diagnostics
validate = true

#─────────────────────────────────────────────────────────────
# REMEDIATION LOG
#─────────────────────────────────────────────────────────────

[logging]
enabled = false
# file = "~/.local/share/wif/remediation.log"

# "text" | "json"
format = "text"

# Snippet redaction: "none" | "full"
redaction = "none"

[logging.events]
patched = true
failed = true
unchanged = false
"#
        .to_string()
    }
}
