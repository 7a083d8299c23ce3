//! CLI argument parsing and command handling.
//!
//! This module provides the command-line interface for wif
//! (`workflow_injection_fixer`): remediating findings, linting workflows, and
//! managing configuration.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::catalog::catalog;
use crate::config::{Config, PROJECT_CONFIG_NAME};
use crate::finding::Finding;
use crate::logging::RemediationLogger;
use crate::parser::YamlWorkflowParser;
use crate::remediate::{BatchSummary, FindingOutcome, Patch, generate_patch, remediate_all};
use crate::validate::{Diagnostic, WorkflowParser};

/// Fix script injection in CI workflows.
///
/// wif rewrites attacker-controlled `${{ github.* }}` interpolations inside
/// `run:` commands into environment variables declared once at the top of the
/// workflow, and prints the change as a unified diff ready for `git apply`.
#[derive(Parser, Debug)]
#[command(name = "wif")]
#[command(version, about, long_about = None)]
#[command(after_help = "Run 'wif catalog' to list the expressions wif can remediate.")]
pub struct Cli {
    /// Show engine tracing on stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Color output (overrides config)
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Fold command-line flags into the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if self.verbose {
            config.general.verbose = true;
        }
        if let Some(color) = self.color {
            config.general.color = color.as_str().to_string();
        }
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remediate a single finding and print the patch
    #[command(name = "patch")]
    Patch(PatchCommand),

    /// Remediate every finding listed in a JSON file
    #[command(name = "batch")]
    Batch(BatchCommand),

    /// Print the diagnostics the validator sees for a workflow
    #[command(name = "lint")]
    Lint {
        /// Workflow file
        file: PathBuf,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// List the dangerous expressions in precedence order
    #[command(name = "catalog")]
    Catalog {
        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Show the effective configuration
    #[command(name = "config")]
    ShowConfig,

    /// Write a sample configuration file
    #[command(name = "init")]
    Init {
        /// Output path (prints to stdout when omitted)
        #[arg(long, short)]
        output: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Arguments for `wif patch`.
#[derive(Args, Debug)]
pub struct PatchCommand {
    /// Workflow file
    pub file: PathBuf,

    /// 1-based line of the `run:` command holding the expression
    #[arg(long, short = 'l')]
    pub line: usize,

    /// Dangerous expression, e.g. `github.event.issue.title`
    #[arg(long, short = 's')]
    pub snippet: String,

    /// Repository-relative path used in the diff headers (defaults to FILE)
    #[arg(long)]
    pub path: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = PatchFormat::Diff)]
    pub format: PatchFormat,

    /// Skip re-parsing the patched workflow
    #[arg(long)]
    pub no_validate: bool,
}

/// Arguments for `wif batch`.
#[derive(Args, Debug)]
pub struct BatchCommand {
    /// Workflow file every finding refers to
    pub file: PathBuf,

    /// JSON array of `{path, offset, snippet}` findings
    #[arg(long)]
    pub findings: PathBuf,

    /// Output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Remediate findings one at a time
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Always => "always",
            Self::Never => "never",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PatchFormat {
    /// Unified diff, ready for `git apply`
    #[default]
    Diff,
    /// The patch and its metadata as JSON
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable colored output
    #[default]
    Pretty,
    /// Structured JSON output for automation
    Json,
}

/// Run a subcommand against the effective configuration.
///
/// # Errors
///
/// Returns an error when input files cannot be read, a finding cannot be
/// remediated, or any finding of a batch fails.
pub fn run_command(command: Command, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Patch(cmd) => patch(&cmd, config)?,
        Command::Batch(cmd) => batch(&cmd, config)?,
        Command::Lint { file, format } => lint(&file, format)?,
        Command::Catalog { format } => print_catalog(format)?,
        Command::ShowConfig => show_config(config)?,
        Command::Init { output, force } => init_config(output, force)?,
    }
    Ok(())
}

fn read_file(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()).into())
}

fn elapsed_us(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX)
}

/// Remediate one finding.
fn patch(cmd: &PatchCommand, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_file(&cmd.file)?;
    let logical_path = cmd
        .path
        .clone()
        .unwrap_or_else(|| cmd.file.display().to_string());
    let finding = Finding::new(logical_path, cmd.line, cmd.snippet.clone());

    let mut options = config.remediation_options();
    if cmd.no_validate {
        options.validate = false;
    }

    let parser = YamlWorkflowParser::new();
    let original = parser.parse(&content);
    let start = Instant::now();
    let result = generate_patch(&finding, &content, &original, &parser, &options);
    let elapsed = elapsed_us(start);

    let outcome = FindingOutcome::from(result);
    if let Some(logger) = RemediationLogger::new(&config.logging) {
        logger.log(&finding, &outcome, Some(elapsed));
    }

    let patch = match outcome {
        FindingOutcome::Patched(patch) => patch,
        FindingOutcome::Failed(error) => return Err(error.into()),
    };

    match cmd.format {
        PatchFormat::Diff => {
            if patch.is_empty() {
                eprintln!("{} workflow already uses ${}", "note:".cyan(), patch.variable);
            }
            print!("{}", patch.diff);
        }
        PatchFormat::Json => println!("{}", serde_json::to_string_pretty(&patch)?),
    }
    Ok(())
}

/// Remediate every finding in a findings file.
fn batch(cmd: &BatchCommand, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_file(&cmd.findings)?;
    let findings = Finding::parse_list(&content)
        .map_err(|e| format!("invalid findings file {}: {e}", cmd.findings.display()))?;
    let workflow = read_file(&cmd.file)?;

    let mut options = config.remediation_options();
    if cmd.sequential {
        options.parallel = false;
    }

    let parser = YamlWorkflowParser::new();
    let original = parser.parse(&workflow);
    let outcomes = remediate_all(&findings, &workflow, &original, &parser, &options);
    let summary = BatchSummary::from_outcomes(&outcomes);

    if let Some(logger) = RemediationLogger::new(&config.logging) {
        // Outcomes are in stable offset order; line the findings up the same way.
        let mut ordered: Vec<&Finding> = findings.iter().collect();
        ordered.sort_by_key(|f| f.offset);
        for (finding, outcome) in ordered.into_iter().zip(&outcomes) {
            logger.log(finding, outcome, None);
        }
    }

    match cmd.format {
        OutputFormat::Pretty => print_outcomes_pretty(&outcomes, &summary),
        OutputFormat::Json => {
            let report = serde_json::json!({
                "outcomes": outcomes,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if summary.has_failures() {
        return Err(format!(
            "{} of {} finding(s) could not be remediated",
            summary.failed, summary.total
        )
        .into());
    }
    Ok(())
}

fn print_outcomes_pretty(outcomes: &[FindingOutcome], summary: &BatchSummary) {
    for outcome in outcomes {
        let location = format!("{}:{}", outcome.path(), outcome.offset());
        match outcome {
            FindingOutcome::Patched(patch) if patch.is_empty() => {
                println!("{} {location} already uses ${}", "=".cyan(), patch.variable);
            }
            FindingOutcome::Patched(patch) => {
                println!("{} {location} -> ${}", "✓".green(), patch.variable.bold());
                print_patch_details(patch);
                print_diff_colored(&patch.diff);
            }
            FindingOutcome::Failed(error) => {
                println!("{} {location}: {}", "✗".red(), error.kind().to_string().red());
                if let crate::error::RemediationErrorKind::PatchRegression { diagnostics } =
                    error.kind()
                {
                    for d in diagnostics {
                        println!("    {d}");
                    }
                }
            }
        }
    }
    println!();
    println!(
        "{} patched, {} unchanged, {} failed ({} total)",
        summary.patched.to_string().green(),
        summary.unchanged,
        summary.failed.to_string().red(),
        summary.total
    );
}

fn print_patch_details(patch: &Patch) {
    if patch.reused_existing {
        println!("    {}", "reused existing env entry".dimmed());
    } else if patch.inserted_block {
        println!("    {}", "created workflow-level env block".dimmed());
    }
}

fn print_diff_colored(diff: &str) {
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") || line.starts_with("diff ") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}

/// Print the bundled parser's diagnostics for a workflow.
fn lint(file: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let content = read_file(file)?;
    let diagnostics = YamlWorkflowParser::new().parse(&content);

    match format {
        OutputFormat::Pretty => print_diagnostics(file, &diagnostics),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diagnostics)?),
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(format!("{} diagnostic(s) in {}", diagnostics.len(), file.display()).into())
    }
}

fn print_diagnostics(file: &Path, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        println!("{} {}", "✓".green(), file.display());
        return;
    }
    for d in diagnostics {
        println!(
            "{}:{}:{}: {} {}",
            file.display(),
            d.line,
            d.column,
            d.message,
            format!("[{}]", d.kind).dimmed()
        );
    }
}

/// List the catalog in precedence order.
fn print_catalog(format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let entries = catalog();
    match format {
        OutputFormat::Pretty => {
            println!("Dangerous expressions (first match wins):");
            println!();
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            for (index, entry) in entries.iter().enumerate() {
                let name = format!("{:<width$}", entry.name);
                println!(
                    "  {:>2}. {}  {}",
                    index + 1,
                    name.bold(),
                    entry.expression.dimmed()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
    }
    Ok(())
}

/// Show the current configuration
fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Config sources (lowest → highest priority):");
    let system_cfg = PathBuf::from("/etc/wif").join("config.toml");
    if system_cfg.exists() {
        println!("  - system: {}", system_cfg.display());
    }
    if let Some(user_cfg) = Config::user_config_path() {
        if user_cfg.exists() {
            println!("  - user: {}", user_cfg.display());
        }
    }
    let project_cfg = PathBuf::from(PROJECT_CONFIG_NAME);
    if project_cfg.exists() {
        println!("  - project: {}", project_cfg.display());
    }
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Generate a sample configuration file
fn init_config(output: Option<String>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sample = Config::generate_sample_config();

    match output {
        Some(path) => {
            let path = Path::new(&path);
            if path.exists() && !force {
                return Err(
                    format!("File exists: {}. Use --force to overwrite.", path.display()).into(),
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            std::fs::write(path, sample)?;
            println!("Configuration written to: {}", path.display());
        }
        None => {
            println!("{sample}");
        }
    }

    Ok(())
}
