//! Info command: show package, config, and resolved technologies.

use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use vbump_core::TechnologyConfig;
use vbump_core::config::{self, Config};

/// Arguments for the `info` subcommand.
#[derive(Args, Debug, Default)]
pub struct InfoArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct PackageInfo {
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    repository: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    homepage: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    license: &'static str,
}

impl PackageInfo {
    const fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            description: env!("CARGO_PKG_DESCRIPTION"),
            repository: env!("CARGO_PKG_REPOSITORY"),
            homepage: env!("CARGO_PKG_HOMEPAGE"),
            license: env!("CARGO_PKG_LICENSE"),
        }
    }
}

#[derive(Serialize)]
struct ConfigInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    config_file: Option<String>,
    log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    log_dir: Option<String>,
    /// Whether technologies come from built-in defaults.
    auto: bool,
    commit: bool,
    sign: bool,
}

impl ConfigInfo {
    fn from_config(config: &Config, cwd: &Utf8Path) -> Self {
        Self {
            config_file: config::find_project_config(cwd).map(|p| p.to_string()),
            log_level: config.log_level.as_str().to_string(),
            log_dir: config.log_dir.as_ref().map(|p| p.to_string()),
            auto: !config.has_technology_sections(),
            commit: config.commit_enabled(),
            sign: config.sign_enabled(),
        }
    }
}

#[derive(Serialize)]
struct FullInfo {
    #[serde(flatten)]
    package: PackageInfo,
    config: ConfigInfo,
    technologies: Vec<TechnologyConfig>,
}

/// Print package information.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `config` - Loaded configuration
/// * `cwd` - Current working directory for config discovery
#[instrument(name = "cmd_info", skip_all, fields(json_output))]
pub fn cmd_info(
    _args: InfoArgs,
    global_json: bool,
    config: &Config,
    cwd: &Utf8Path,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing info command");

    let info = FullInfo {
        package: PackageInfo::new(),
        config: ConfigInfo::from_config(config, cwd),
        technologies: config.technologies(),
    };

    if global_json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("{} {}", info.package.name.bold(), info.package.version.green());
    if !info.package.description.is_empty() {
        println!("{}", info.package.description);
    }
    if !info.package.license.is_empty() {
        println!("{}: {}", "License".dimmed(), info.package.license);
    }
    if !info.package.repository.is_empty() {
        println!("{}: {}", "Repository".dimmed(), info.package.repository.cyan());
    }

    println!();
    println!("{}", "Configuration".bold().underline());
    if let Some(ref path) = info.config.config_file {
        println!("{}: {}", "Config file".dimmed(), path.cyan());
    } else {
        println!("{}: {}", "Config file".dimmed(), "none loaded".yellow());
    }
    println!("{}: {}", "Log level".dimmed(), info.config.log_level);
    if let Some(ref dir) = info.config.log_dir {
        println!("{}: {}", "Log directory".dimmed(), dir);
    }
    println!("{}: {}", "Commit".dimmed(), yes_no(info.config.commit));
    println!("{}: {}", "Sign".dimmed(), yes_no(info.config.sign));

    println!();
    println!("{}", "Technologies".bold().underline());
    if info.config.auto {
        println!("  {}", "(no technology sections, using built-ins)".dimmed());
    }
    for technology in &info.technologies {
        print_technology(technology);
    }

    Ok(())
}

fn print_technology(technology: &TechnologyConfig) {
    let marker = if technology.enabled {
        "✓".green().to_string()
    } else {
        "○".yellow().to_string()
    };
    println!(
        "  {marker} {} in {}",
        technology.id.cyan(),
        technology.directories.join(", ")
    );
    if let Some(ref files) = technology.files {
        println!("      {}: {}", "files".dimmed(), files.join(", "));
    }
    if !technology.exclude_files.is_empty() {
        println!(
            "      {}: {}",
            "exclude".dimmed(),
            technology.exclude_files.join(", ")
        );
    }
    if let Some(ref patterns) = technology.regex {
        for pattern in patterns {
            println!("      {}: {pattern}", "regex".dimmed());
        }
    }
    if let Some(ref fields) = technology.json_fields {
        println!("      {}: {}", "json fields".dimmed(), fields.join(", "));
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
