//! Semantic version values and their increment rules.
//!
//! [`VersionValue`] wraps a [`semver::Version`] and adds the promotion
//! rules for `alpha` → `beta` → `rc` prereleases. All mutation goes
//! through [`VersionValue::increment`], which either applies the whole
//! transition or leaves the value untouched.

pub mod prerelease;

use std::fmt;

use regex::Regex;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use prerelease::{PrereleaseKind, PrereleaseTag, Segment};

/// Loose pattern for a semantic version embedded in arbitrary text.
///
/// Accepts an optional `v`/`V` prefix, a prerelease that starts with
/// either digits or letters, and optional build metadata.
pub const VERSION_PATTERN: &str = concat!(
    r"[vV]?[0-9]+\.[0-9]+\.[0-9]+",
    r"(?:-[0-9]+[0-9A-Za-z\-~]*(?:\.[0-9A-Za-z\-~]+)*",
    r"|-[A-Za-z\-~]+[0-9A-Za-z\-~]*(?:\.[0-9A-Za-z\-~]+)*)?",
    r"(?:\+[0-9A-Za-z\-~]+(?:\.[0-9A-Za-z\-~]+)*)?",
);

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The text is not a strict semantic version.
    #[error("invalid version {input:?}: {source}")]
    InvalidVersion {
        /// Text that failed to parse (after prefix stripping).
        input: String,
        /// Underlying parser error.
        source: semver::Error,
    },

    /// The pattern did not capture a `version` group on the line.
    #[error("no version found in {line:?} using {pattern}")]
    NoMatch {
        /// Line that was searched.
        line: String,
        /// Pattern source.
        pattern: String,
    },

    /// The requested bump is not allowed from the current value.
    #[error("{0}")]
    IllegalTransition(String),

    /// `increment_prerelease` was called on a release version.
    #[error("{0} is not a prerelease")]
    NotAPrerelease(String),

    /// Supplied build metadata is not valid semver metadata.
    #[error("invalid metadata {metadata:?}: {source}")]
    InvalidMetadata {
        /// Rejected metadata.
        metadata: String,
        /// Underlying parser error.
        source: semver::Error,
    },

    /// A computed prerelease tag was rejected by the semver parser.
    #[error("invalid prerelease {prerelease:?}: {source}")]
    InvalidPrerelease {
        /// Rejected prerelease.
        prerelease: String,
        /// Underlying parser error.
        source: semver::Error,
    },

    /// The value was never parsed.
    #[error("version is uninitialized")]
    Uninitialized,
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpLevel {
    /// Every level, smallest first.
    pub const ALL: &'static [Self] = &[Self::Patch, Self::Minor, Self::Major];

    /// Lowercase name as used on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested increment: numeric level, prerelease target and metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumpRequest {
    /// Numeric component to bump.
    pub level: Option<BumpLevel>,
    /// Prerelease kind to enter or advance.
    pub prerelease: Option<PrereleaseKind>,
    /// Build metadata to attach (empty keeps the current metadata).
    pub metadata: String,
}

impl BumpRequest {
    /// Whether the request asks for anything at all.
    pub const fn is_empty(&self) -> bool {
        self.level.is_none() && self.prerelease.is_none()
    }

    /// Apply the request to `value`, see [`VersionValue::increment`].
    pub fn apply(&self, value: &mut VersionValue) -> VersionResult<()> {
        value.increment(self.level, self.prerelease, &self.metadata)
    }
}

/// A semantic version that may not have been parsed yet.
///
/// The default value is uninitialized and renders as the empty string.
/// Ordering follows semver precedence, so `1.0.0-rc.1 < 1.0.0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct VersionValue {
    inner: Option<Version>,
}

impl VersionValue {
    /// Parse a strict `MAJOR.MINOR.PATCH[-PRE][+META]` string.
    ///
    /// Leading `v`/`V` characters are stripped first.
    pub fn parse(text: &str) -> VersionResult<Self> {
        let stripped = text.trim_start_matches(['v', 'V']);
        let version = Version::parse(stripped).map_err(|source| VersionError::InvalidVersion {
            input: stripped.to_string(),
            source,
        })?;
        Ok(Self {
            inner: Some(version),
        })
    }

    /// Parse the `version` named group captured by `pattern` on `line`.
    pub fn parse_from_pattern(line: &str, pattern: &Regex) -> VersionResult<Self> {
        let captured = pattern
            .captures(line)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VersionError::NoMatch {
                line: line.to_string(),
                pattern: pattern.as_str().to_string(),
            })?;
        Self::parse(captured)
    }

    /// Whether the value has been parsed.
    pub const fn is_initialized(&self) -> bool {
        self.inner.is_some()
    }

    /// Whether the value carries a prerelease tag.
    pub fn is_prerelease(&self) -> bool {
        self.inner.as_ref().is_some_and(|v| !v.pre.is_empty())
    }

    /// The prerelease tag, empty when there is none.
    pub fn prerelease(&self) -> &str {
        self.inner.as_ref().map_or("", |v| v.pre.as_str())
    }

    /// The build metadata, empty when there is none.
    pub fn metadata(&self) -> &str {
        self.inner.as_ref().map_or("", |v| v.build.as_str())
    }

    /// The underlying semver value, if parsed.
    pub const fn as_semver(&self) -> Option<&Version> {
        self.inner.as_ref()
    }

    /// Apply a numeric bump and/or prerelease transition.
    ///
    /// `metadata` is only consulted when `prerelease` is set; an empty
    /// string keeps whatever metadata survives the transition. On error the
    /// value is left exactly as it was.
    pub fn increment(
        &mut self,
        bump: Option<BumpLevel>,
        prerelease: Option<PrereleaseKind>,
        metadata: &str,
    ) -> VersionResult<()> {
        let current = self.inner.as_ref().ok_or(VersionError::Uninitialized)?;
        let was_prerelease = !current.pre.is_empty();

        match (bump, prerelease) {
            (None, None) => return Ok(()),
            (None, Some(_)) if !was_prerelease => {
                return Err(VersionError::IllegalTransition(
                    "cannot apply a prerelease without incrementing a version component".into(),
                ));
            }
            _ => {}
        }

        let mut next = current.clone();
        if was_prerelease && bump == Some(BumpLevel::Patch) && prerelease.is_some() {
            next.pre = Prerelease::EMPTY;
        }
        if let Some(level) = bump {
            apply_bump(&mut next, level);
        }
        if let Some(target) = prerelease {
            apply_prerelease(&mut next, target)?;
            if !metadata.is_empty() {
                next.build = BuildMetadata::new(metadata).map_err(|source| {
                    VersionError::InvalidMetadata {
                        metadata: metadata.to_string(),
                        source,
                    }
                })?;
            }
        }

        debug!(from = %current, to = %next, "incremented version");
        self.inner = Some(next);
        Ok(())
    }

    /// Advance the prerelease tag: `rc` → `rc.0`, `rc.0` → `rc.1`.
    pub fn increment_prerelease(&mut self) -> VersionResult<()> {
        let current = self.inner.as_ref().ok_or(VersionError::Uninitialized)?;
        let mut next = current.clone();
        increment_prerelease_of(&mut next)?;
        self.inner = Some(next);
        Ok(())
    }
}

impl From<Version> for VersionValue {
    fn from(version: Version) -> Self {
        Self {
            inner: Some(version),
        }
    }
}

impl fmt::Display for VersionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(v) => write!(f, "{v}"),
            None => Ok(()),
        }
    }
}

// ──────────────────────────────────────────────
// Transition helpers
// ──────────────────────────────────────────────

fn apply_bump(version: &mut Version, level: BumpLevel) {
    match level {
        BumpLevel::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
            version.pre = Prerelease::EMPTY;
        }
        BumpLevel::Minor => {
            version.minor += 1;
            version.patch = 0;
            version.pre = Prerelease::EMPTY;
        }
        BumpLevel::Patch => {
            // A patch bump on a prerelease releases it in place.
            if version.pre.is_empty() {
                version.patch += 1;
            } else {
                version.pre = Prerelease::EMPTY;
            }
        }
    }
    version.build = BuildMetadata::EMPTY;
}

fn apply_prerelease(version: &mut Version, target: PrereleaseKind) -> VersionResult<()> {
    match PrereleaseTag::parse(version.pre.as_str()) {
        None => set_prerelease(version, target.as_str())?,
        Some(tag) => match PrereleaseKind::classify(&tag.first()) {
            Some(current) if current == target => {}
            Some(current) if current < target => set_prerelease(version, target.as_str())?,
            Some(current) => {
                return Err(VersionError::IllegalTransition(format!(
                    "cannot move a {current} prerelease back to {target}"
                )));
            }
            // Unknown tags are advanced as they are.
            None => {}
        },
    }
    increment_prerelease_of(version)
}

fn increment_prerelease_of(version: &mut Version) -> VersionResult<()> {
    let mut tag = PrereleaseTag::parse(version.pre.as_str())
        .ok_or_else(|| VersionError::NotAPrerelease(version.to_string()))?;
    tag.increment();
    set_prerelease(version, &tag.to_string())
}

fn set_prerelease(version: &mut Version, text: &str) -> VersionResult<()> {
    version.pre = Prerelease::new(text).map_err(|source| VersionError::InvalidPrerelease {
        prerelease: text.to_string(),
        source,
    })?;
    Ok(())
}
