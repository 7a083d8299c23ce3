#![forbid(unsafe_code)]
//! wif: script-injection remediation for CI workflows.
//!
//! Exit behavior:
//!   - 0: success (patch printed, batch fully remediated, lint clean)
//!   - 1: a finding could not be remediated, or the input was unusable
//!   - 2: invalid arguments

use clap::Parser;
use colored::Colorize;
use std::io::{self, IsTerminal};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use workflow_injection_fixer::cli::{self, Cli};
use workflow_injection_fixer::config::{ColorMode, Config};

/// Configure colored output from the configured mode and TTY detection.
///
/// In auto mode colors are disabled when stdout is not a terminal (e.g. a
/// diff piped into `git apply`).
fn configure_colors(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

/// Install the stderr tracing subscriber: debug output when verbose,
/// warnings only otherwise.
fn configure_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: cannot install tracing subscriber: {e}");
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::load();
    cli.apply_to(&mut config);

    configure_colors(config.color_mode());
    configure_tracing(config.general.verbose);

    if let Err(e) = cli::run_command(cli.command, &config) {
        eprintln!("{} {e}", "error:".red().bold());
        std::process::exit(1);
    }
}
