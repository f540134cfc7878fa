//! Configuration loading and discovery.
//!
//! Sources are merged with figment, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (`~/.config/vbump/config.<ext>`)
//! 3. Project config, found by walking up from the working directory
//! 4. Explicit files (`--config`)
//!
//! # Project config names
//!
//! In each directory, for each `<ext>` of `toml`, `yaml`, `yml`, `json`:
//! `.vbump.<ext>` then `vbump.<ext>`. The legacy `.bump` file (always
//! TOML) is tried last. The walk ends at the first directory holding a `.git`
//! entry, after that directory has been searched.
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use vbump_core::config::ConfigLoader;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let cwd = Utf8PathBuf::try_from(cwd).expect("current directory is not valid UTF-8");
//! let config = ConfigLoader::new()
//!     .with_project_search(&cwd)
//!     .load()
//!     .unwrap();
//! for technology in config.technologies() {
//!     println!("{} -> {:?}", technology.id, technology.directories);
//! }
//! ```

use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::extract::{Builtin, TechnologyConfig};

/// The configuration for vbump.
///
/// Technology sections are optional. When none is present every built-in
/// technology is enabled for the project root.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<Utf8PathBuf>,
    /// Dockerfile settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker: Option<TechnologySection>,
    /// Go source settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go: Option<TechnologySection>,
    /// `package.json` settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript: Option<TechnologySection>,
    /// Extra technologies located by regex or JSON field.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generic: Vec<TechnologySection>,
    /// Commit and signing behavior.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitConfig>,
}

/// One technology section.
///
/// Unset fields fall back to the built-in defaults for that technology.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct TechnologySection {
    /// Name of a `[[generic]]` entry; ignored on built-in sections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the technology takes part (default: `true` once the section exists).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Directories to scan, relative to the project root (default: `["."]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directories: Option<Vec<String>>,
    /// Include globs on file names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    /// Exclude globs on root-relative paths or file names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_files: Option<Vec<String>>,
    /// Line regexes with a `version` capture group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<Vec<String>>,
    /// Dotted JSON field paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_fields: Option<Vec<String>>,
}

impl TechnologySection {
    /// Resolve the section into the settings a scan runs with.
    pub fn resolve(&self, id: impl Into<String>) -> TechnologyConfig {
        let mut technology = TechnologyConfig::new(id);
        technology.enabled = self.enabled.unwrap_or(true);
        if let Some(directories) = &self.directories {
            technology.directories.clone_from(directories);
        }
        technology.files.clone_from(&self.files);
        technology.exclude_files = self.exclude_files.clone().unwrap_or_default();
        technology.regex.clone_from(&self.regex);
        technology.json_fields.clone_from(&self.json_fields);
        technology
    }
}

/// Commit and signing behavior after a successful run.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GitConfig {
    /// Stage, commit and tag modified files (default: `true`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<bool>,
    /// Sign when `commit.gpgsign` is set in git (default: `true`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign: Option<bool>,
}

impl Config {
    /// Whether any technology section was configured.
    pub fn has_technology_sections(&self) -> bool {
        self.docker.is_some()
            || self.go.is_some()
            || self.javascript.is_some()
            || !self.generic.is_empty()
    }

    /// The ordered technology list for a run: docker, go, javascript,
    /// then generic entries in file order.
    pub fn technologies(&self) -> Vec<TechnologyConfig> {
        if !self.has_technology_sections() {
            return Builtin::ALL
                .iter()
                .map(|b| TechnologyConfig::new(b.id()))
                .collect();
        }

        let builtins = [
            (Builtin::Docker, &self.docker),
            (Builtin::Go, &self.go),
            (Builtin::JavaScript, &self.javascript),
        ];
        let mut technologies: Vec<TechnologyConfig> = builtins
            .into_iter()
            .filter_map(|(builtin, section)| section.as_ref().map(|s| s.resolve(builtin.id())))
            .collect();
        technologies.extend(
            self.generic
                .iter()
                .map(|s| s.resolve(s.name.as_deref().unwrap_or("generic"))),
        );
        technologies
    }

    /// Whether modified files should be committed.
    pub fn commit_enabled(&self) -> bool {
        self.git.as_ref().and_then(|g| g.commit).unwrap_or(true)
    }

    /// Whether commits should be signed when git asks for it.
    pub fn sign_enabled(&self) -> bool {
        self.git.as_ref().and_then(|g| g.sign).unwrap_or(true)
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

const APP_NAME: &str = "vbump";

/// Extensionless TOML file read by older releases.
const LEGACY_CONFIG: &str = ".bump";

/// File names tried in each directory of the upward walk, best first.
fn project_candidates() -> impl Iterator<Item = String> {
    CONFIG_EXTENSIONS
        .iter()
        .flat_map(|ext| [format!(".{APP_NAME}.{ext}"), format!("{APP_NAME}.{ext}")])
        .chain(std::iter::once(LEGACY_CONFIG.to_string()))
}

/// Collects config sources and merges them into a [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    search_from: Option<Utf8PathBuf>,
    user_config: bool,
    stop_at: Option<String>,
    files: Vec<Utf8PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// User config on, no project search, walk bounded by `.git`.
    pub fn new() -> Self {
        Self {
            search_from: None,
            user_config: true,
            stop_at: Some(".git".to_string()),
            files: Vec::new(),
        }
    }

    /// Look for a project config in `dir` and its parents.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.search_from = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Include or skip `~/.config/vbump/config.<ext>`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.user_config = include;
        self
    }

    /// Stop the upward walk at a directory containing `marker`.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.stop_at = Some(marker.into());
        self
    }

    /// Walk all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.stop_at = None;
        self
    }

    /// Merge `path` after everything else. Repeatable; last one wins.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.files.push(path.as_ref().to_path_buf());
        self
    }

    /// Config files that [`load`](Self::load) would read, lowest precedence first.
    pub fn sources(&self) -> Vec<Utf8PathBuf> {
        let user = self.user_config.then(find_user_config).flatten();
        let project = self
            .search_from
            .as_deref()
            .and_then(|dir| self.find_project_config(dir));
        user.into_iter()
            .chain(project)
            .chain(self.files.iter().cloned())
            .collect()
    }

    /// Merge defaults and every source, then deserialize.
    #[tracing::instrument(skip(self), fields(search_from = ?self.search_from))]
    pub fn load(self) -> ConfigResult<Config> {
        let sources = self.sources();
        let figment = sources.iter().fold(
            Figment::from(Serialized::defaults(Config::default())),
            |figment, source| {
                tracing::debug!(%source, "merging config file");
                merge_source(figment, source)
            },
        );

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            sources = sources.len(),
            technologies = config.technologies().len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Like [`load`](Self::load), but at least one file must exist.
    pub fn load_or_error(self) -> ConfigResult<Config> {
        if self.sources().is_empty() {
            return Err(ConfigError::NotFound);
        }
        self.load()
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        for dir in start.ancestors() {
            if let Some(found) = project_candidates()
                .map(|name| dir.join(name))
                .find(|path| path.is_file())
            {
                return Some(found);
            }
            // the directory holding the marker is still searched
            if self
                .stop_at
                .as_deref()
                .is_some_and(|marker| dir.join(marker).exists())
            {
                tracing::debug!(%dir, "config search stopped at boundary");
                return None;
            }
        }
        None
    }
}

fn find_user_config() -> Option<Utf8PathBuf> {
    let dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

/// Pick the figment provider by extension; anything else is TOML.
fn merge_source(figment: Figment, path: &Utf8Path) -> Figment {
    let file = path.as_str();
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
        Some("json") => figment.merge(Json::file_exact(file)),
        _ => figment.merge(Toml::file_exact(file)),
    }
}

/// The project config file that a default loader would pick from `start`.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new().find_project_config(start.as_ref())
}

fn project_dir(pick: fn(&ProjectDirs) -> &Path) -> Option<Utf8PathBuf> {
    let dirs = ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(pick(&dirs).to_path_buf()).ok()
}

/// Per-user config directory (`~/.config/vbump` on Linux).
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    project_dir(ProjectDirs::config_dir)
}

/// Per-user local data directory; logs default to `<this>/logs`.
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    project_dir(ProjectDirs::data_local_dir)
}
