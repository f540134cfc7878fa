//! Doctor command: diagnose configuration and environment.

use camino::Utf8Path;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use vbump_core::config::{self, Config, ConfigLoader, GitConfig, TechnologySection};
use vbump_core::extract::Builtin;
use vbump_core::git::{Repository, SystemGit};
use vbump_core::{git, gpg};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    directories: DirectoryPaths,
    config: ConfigStatus,
    tools: ToolStatus,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct DirectoryPaths {
    config: Option<String>,
    data_local: Option<String>,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Files that would be merged, lowest precedence first
    sources: Vec<String>,
    /// Whether a project config file was found
    found: bool,
}

#[derive(Serialize)]
struct ToolStatus {
    git: bool,
    gpg: bool,
    /// Whether the working directory is inside a git work tree
    repository: bool,
    /// Key from `user.signingkey` when `commit.gpgsign` is on
    signing_key: Option<String>,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    cwd: String,
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn read(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            value: std::env::var(name).ok(),
            description,
        }
    }
}

impl DoctorReport {
    fn gather(cwd: &Utf8Path) -> Self {
        let sources = ConfigLoader::new().with_project_search(cwd).sources();
        let found = config::find_project_config(cwd).is_some();

        let git_available = git::is_available();
        let repo = SystemGit::new(cwd);
        let repository = git_available && repo.is_inside_repo().unwrap_or(false);
        let signing_key = if repository {
            repo.signing_key().ok().flatten()
        } else {
            None
        };

        Self {
            directories: DirectoryPaths {
                config: config::user_config_dir().map(|p| p.to_string()),
                data_local: config::user_data_local_dir().map(|p| p.to_string()),
            },
            config: ConfigStatus {
                sources: sources.iter().map(ToString::to_string).collect(),
                found,
            },
            tools: ToolStatus {
                git: git_available,
                gpg: gpg::is_available(),
                repository,
                signing_key,
            },
            environment: EnvironmentInfo {
                cwd: cwd.to_string(),
                env_vars: vec![
                    EnvVar::read("XDG_CONFIG_HOME", "Override config directory"),
                    EnvVar::read("XDG_DATA_HOME", "Override data directory"),
                    EnvVar::read("RUST_LOG", "Log filter directive"),
                    EnvVar::read("VBUMP_LOG_PATH", "Explicit log file path"),
                    EnvVar::read("VBUMP_LOG_DIR", "Log directory"),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `cwd` - Current working directory
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(_args: DoctorArgs, global_json: bool, cwd: &Utf8Path) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let report = DoctorReport::gather(cwd);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if report.config.sources.is_empty() {
        println!("  {} No config file found, using built-in technologies", "○".yellow());
    }
    for source in &report.config.sources {
        println!("  {} {}", "✓".green(), source.cyan());
    }
    if !report.config.found {
        offer_config_creation(cwd)?;
    }
    println!();

    println!("{}", "Tools".bold().underline());
    print_check("git on PATH", report.tools.git);
    print_check("gpg on PATH", report.tools.gpg);
    print_check("inside a git repository", report.tools.repository);
    match report.tools.signing_key {
        Some(ref key) => println!("  {} signing key {}", "✓".green(), key.cyan()),
        None => println!("  {} commits are not signed", "○".dimmed()),
    }
    println!();

    println!("{}", "Directories".bold().underline());
    print_dir("  Config", report.directories.config.as_deref());
    print_dir("  Data (local)", report.directories.data_local.as_deref());
    println!();

    println!("{}", "Environment".bold().underline());
    println!("  {}: {}", "Working directory".dimmed(), report.environment.cwd.cyan());
    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No XDG/logging overrides set", "○".dimmed());
    }
    for var in set_vars {
        println!(
            "  {}: {} {}",
            var.name.dimmed(),
            var.value.as_deref().unwrap_or("").cyan(),
            format!("({})", var.description).dimmed()
        );
    }

    Ok(())
}

fn print_check(label: &str, ok: bool) {
    if ok {
        println!("  {} {label}", "✓".green());
    } else {
        println!("  {} {label}", "✗".red());
    }
}

fn print_dir(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Starter project config listing every built-in technology.
fn starter_config() -> Config {
    let section = || {
        Some(TechnologySection {
            enabled: Some(true),
            directories: Some(vec![".".to_string()]),
            ..TechnologySection::default()
        })
    };
    Config {
        docker: section(),
        go: section(),
        javascript: section(),
        git: Some(GitConfig {
            commit: Some(true),
            sign: Some(true),
        }),
        ..Config::default()
    }
}

/// Offer to create a project config file when none exists.
fn offer_config_creation(cwd: &Utf8Path) -> anyhow::Result<()> {
    if !super::is_interactive() {
        return Ok(());
    }

    let config_path = cwd.join(".vbump.yaml");
    let create = Confirm::new("Create a project config file?")
        .with_default(false)
        .with_help_message(&format!(
            "Will create {config_path} enabling {}",
            Builtin::ALL
                .iter()
                .map(|b| b.id())
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .prompt();

    // declined or interrupted: leave things as they are
    if let Ok(true) = create {
        let yaml = serde_saphyr::to_string(&starter_config())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cwd() -> camino::Utf8PathBuf {
        camino::Utf8PathBuf::from("/tmp")
    }

    #[test]
    fn test_cmd_doctor_text_succeeds() {
        assert!(cmd_doctor(DoctorArgs::default(), false, &test_cwd()).is_ok());
    }

    #[test]
    fn test_cmd_doctor_json_succeeds() {
        assert!(cmd_doctor(DoctorArgs::default(), true, &test_cwd()).is_ok());
    }

    #[test]
    fn test_doctor_report_lists_log_variables() {
        let report = DoctorReport::gather(&test_cwd());
        let names: Vec<_> = report.environment.env_vars.iter().map(|v| v.name).collect();
        assert!(names.contains(&"VBUMP_LOG_PATH"));
        assert!(names.contains(&"VBUMP_LOG_DIR"));
    }

    #[test]
    fn test_starter_config_is_not_auto_mode() {
        let config = starter_config();
        assert!(config.has_technology_sections());
        assert_eq!(config.technologies().len(), 3);
    }
}
