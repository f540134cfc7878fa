//! Core library for vbump.
//!
//! Finds the version string of a project in Dockerfiles, Go sources,
//! `package.json` and any configured file, checks that every occurrence
//! agrees, rewrites them all to the next semantic version, then commits
//! and tags the result.
//!
//! # Modules
//!
//! - [`bump`] - Run orchestration (scan, decide, write, commit)
//! - [`config`] - Configuration loading and management
//! - [`error`] - Configuration error types
//! - [`extract`] - Per-technology version extractors
//! - [`gate`] - Consistency gate shared by scanner and writers
//! - [`git`] - Git storage for a finished bump
//! - [`gpg`] - Signing-key passphrase validation
//! - [`prompt`] - User-interaction traits
//! - [`scan`] - Directory scanning
//! - [`version`] - Version parsing and increment rules
//! - [`writer`] - Concurrent file writers
//!
//! # Quick Start
//!
//! ```no_run
//! use camino::Utf8Path;
//! use vbump_core::{BumpLevel, BumpRequest, Bumper, ConfigLoader, RunOptions};
//!
//! let root = Utf8Path::new(".");
//! let config = ConfigLoader::new()
//!     .with_project_search(root)
//!     .load()
//!     .expect("Failed to load configuration");
//! let technologies = config.technologies();
//!
//! let options = RunOptions {
//!     request: BumpRequest {
//!         level: Some(BumpLevel::Patch),
//!         ..BumpRequest::default()
//!     },
//!     dry_run: true,
//!     ..RunOptions::default()
//! };
//! let result = Bumper::new(root, &technologies).run(&options).unwrap();
//! println!("{} -> {}", result.previous_version, result.version);
//! ```
#![deny(unsafe_code)]

pub mod bump;

pub mod config;

pub mod error;

pub mod extract;

pub mod gate;

pub mod git;

pub mod gpg;

pub mod prompt;

pub mod scan;

pub mod version;

pub mod writer;

pub use bump::{BumpError, BumpResult, Bumper, RunOptions, RunResult};

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};

pub use extract::TechnologyConfig;

pub use version::{BumpLevel, BumpRequest, PrereleaseKind, VersionValue};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
