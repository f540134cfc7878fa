//! Argument parsing and command dispatch for the `vbump` binary.
//!
//! Everything that changes files lives in `vbump_core`; this crate turns
//! flags into [`vbump_core::bump::RunOptions`], supplies terminal prompts
//! and renders results. [`command()`] feeds `cargo xtask` for completions
//! and man pages.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// When to colorize terminal output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorChoice {
    /// Color when stdout supports it.
    #[default]
    Auto,
    /// Color even when piped.
    Always,
    /// Plain text.
    Never,
}

impl ColorChoice {
    /// Install the choice as the process-wide owo-colors override.
    pub fn apply(self) {
        let forced = match self {
            Self::Auto => None,
            Self::Always => Some(true),
            Self::Never => Some(false),
        };
        if let Some(enabled) = forced {
            owo_colors::set_override(enabled);
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG           Log filter (e.g., debug, vbump_core=trace)
    VBUMP_LOG_PATH     Explicit log file path
    VBUMP_LOG_DIR      Log directory
";

/// Command-line interface definition for vbump.
#[derive(Parser)]
#[command(name = "vbump")]
#[command(about = "Bump the semantic version of a project in every file at once", long_about = None)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config file merged last (repeat the flag to layer more)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Vec<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Log errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Print machine-readable JSON on stdout; never prompts
    #[arg(long, global = true)]
    pub json: bool,
}

/// Subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Increment the version in every configured file
    Bump(commands::bump::BumpArgs),

    /// Diagnose configuration and environment
    Doctor(commands::doctor::DoctorArgs),

    /// Show package, configuration and technology information
    Info(commands::info::InfoArgs),
}

/// The clap command tree, for completions and man pages.
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
