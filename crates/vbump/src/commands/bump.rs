//! Bump command, a thin CLI layer over `vbump_core::bump`.

use anyhow::{Context, bail};
use camino::Utf8Path;
use clap::{ArgGroup, Args};
use inquire::{Select, Text};
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use vbump_core::bump::{Bumper, RunOptions, RunResult};
use vbump_core::config::Config;
use vbump_core::git::{GitError, SystemGit};
use vbump_core::{BumpLevel, BumpRequest, PrereleaseKind};

use super::{TerminalConfirm, TerminalPassphrase, is_interactive, prompt_error};

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug, Default)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .multiple(true)
        .args(["level", "alpha", "beta", "rc", "interactive"])
))]
#[command(group(ArgGroup::new("prerelease").args(["alpha", "beta", "rc"])))]
pub struct BumpArgs {
    /// Version component to increment
    #[arg(value_enum)]
    pub level: Option<BumpLevel>,

    /// Enter or advance an alpha prerelease
    #[arg(long)]
    pub alpha: bool,

    /// Enter or advance a beta prerelease
    #[arg(long)]
    pub beta: bool,

    /// Enter or advance a release candidate
    #[arg(long)]
    pub rc: bool,

    /// Build metadata to attach (e.g. "build.42")
    #[arg(long, value_name = "META")]
    pub metadata: Option<String>,

    /// Show what would change without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Rewrite every file without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Do not commit or tag the modified files
    #[arg(long)]
    pub no_commit: bool,

    /// Do not sign the commit and tag
    #[arg(long)]
    pub no_sign: bool,

    /// Choose level, prerelease and metadata from prompts
    #[arg(short, long)]
    pub interactive: bool,
}

impl BumpArgs {
    /// The prerelease flag given, if any.
    pub const fn prerelease(&self) -> Option<PrereleaseKind> {
        if self.alpha {
            Some(PrereleaseKind::Alpha)
        } else if self.beta {
            Some(PrereleaseKind::Beta)
        } else if self.rc {
            Some(PrereleaseKind::Rc)
        } else {
            None
        }
    }

    /// The increment described by the flags alone.
    pub fn request(&self) -> BumpRequest {
        BumpRequest {
            level: self.level,
            prerelease: self.prerelease(),
            metadata: self.metadata.clone().unwrap_or_default(),
        }
    }
}

/// Execute the bump command.
#[instrument(name = "cmd_bump", skip_all, fields(json_output))]
pub fn cmd_bump(
    args: BumpArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing bump command");

    let request = if args.interactive {
        prompt_request(&args.request()).context("interactive selection failed")?
    } else {
        args.request()
    };
    if request.is_empty() {
        bail!("nothing to bump: choose major, minor, patch or a prerelease flag");
    }

    let options = RunOptions {
        request,
        dry_run: args.dry_run,
        commit: config.commit_enabled() && !args.no_commit,
        sign: config.sign_enabled() && !args.no_sign,
    };
    let technologies = config.technologies();

    let git = SystemGit::new(cwd);
    let committing = options.commit && !options.dry_run;
    if committing && !git.is_inside_repo().context("checking for a git repository")? {
        return Err(GitError::NotARepo).context("use --no-commit to bump outside a repository");
    }

    let interactive = is_interactive() && !global_json;
    let confirm = TerminalConfirm;
    let passphrase = TerminalPassphrase;

    let mut bumper = Bumper::new(cwd, &technologies);
    if committing {
        bumper = bumper.with_repository(&git);
    }
    if interactive && !args.yes {
        bumper = bumper.with_confirm(&confirm);
    }
    if interactive {
        bumper = bumper.with_passphrase_prompt(&passphrase);
    }

    let result = bumper.run(&options).context("bump failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}

fn print_result(result: &RunResult) {
    println!(
        "{}: {} -> {}",
        "Version".bold(),
        result.previous_version.dimmed(),
        result.version.green().bold()
    );
    for file in &result.modified_files {
        println!("  {} {}", "→".dimmed(), file.cyan());
    }
    for file in &result.declined_files {
        println!("  {} {} {}", "○".yellow(), file, "(skipped)".dimmed());
    }

    if result.dry_run {
        println!();
        println!("{}", "Dry run: no changes made.".yellow());
    } else if result.committed {
        println!(
            "  {} Committed and tagged {}",
            "✓".green(),
            format!("v{}", result.version).green().bold()
        );
    } else if !result.modified_files.is_empty() {
        println!("  {} Version updated to {}", "✓".green(), result.version.green().bold());
    }
}

/// Ask for level, prerelease kind and metadata, starting from the flags given.
fn prompt_request(initial: &BumpRequest) -> anyhow::Result<BumpRequest> {
    const NONE: &str = "none";

    let mut levels = vec![NONE];
    levels.extend(BumpLevel::ALL.iter().map(|l| l.as_str()));
    let start = initial.level.map_or(0, |l| {
        BumpLevel::ALL.iter().position(|x| *x == l).map_or(0, |i| i + 1)
    });
    let level = Select::new("Version component:", levels)
        .with_starting_cursor(start)
        .prompt()
        .map_err(prompt_error)?;

    let mut kinds = vec![NONE];
    kinds.extend(PrereleaseKind::ALL.iter().map(|k| k.as_str()));
    let start = initial.prerelease.map_or(0, |k| {
        PrereleaseKind::ALL.iter().position(|x| *x == k).map_or(0, |i| i + 1)
    });
    let prerelease = Select::new("Prerelease:", kinds)
        .with_starting_cursor(start)
        .prompt()
        .map_err(prompt_error)?;

    let metadata = Text::new("Build metadata:")
        .with_default(&initial.metadata)
        .with_help_message("leave empty to keep the current metadata")
        .prompt()
        .map_err(prompt_error)?;

    Ok(BumpRequest {
        level: BumpLevel::ALL.iter().copied().find(|l| l.as_str() == level),
        prerelease: PrereleaseKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == prerelease),
        metadata: metadata.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: BumpArgs,
    }

    fn parse(argv: &[&str]) -> Result<BumpArgs, clap::Error> {
        let argv = std::iter::once("bump").chain(argv.iter().copied());
        Harness::try_parse_from(argv).map(|h| h.args)
    }

    #[test]
    fn level_only() {
        let args = parse(&["minor"]).unwrap();
        let request = args.request();
        assert_eq!(request.level, Some(BumpLevel::Minor));
        assert_eq!(request.prerelease, None);
        assert!(request.metadata.is_empty());
    }

    #[test]
    fn prerelease_without_level() {
        let args = parse(&["--rc", "--metadata", "build.7"]).unwrap();
        let request = args.request();
        assert_eq!(request.level, None);
        assert_eq!(request.prerelease, Some(PrereleaseKind::Rc));
        assert_eq!(request.metadata, "build.7");
    }

    #[test]
    fn nothing_to_bump_is_a_usage_error() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--dry-run"]).is_err());
    }

    #[test]
    fn prerelease_flags_conflict() {
        assert!(parse(&["patch", "--alpha", "--beta"]).is_err());
    }

    #[test]
    fn interactive_satisfies_the_target_group() {
        let args = parse(&["--interactive"]).unwrap();
        assert!(args.interactive);
        assert!(args.request().is_empty());
    }
}
