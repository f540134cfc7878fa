//! Prerelease tags as ordered segment lists.
//!
//! A prerelease such as `rc.22` or `alpha.beta` is split on `.` into
//! segments. Segments that parse as integers are numeric, everything else
//! is free-form text. Incrementing bumps a trailing numeric segment or
//! appends a fresh `0` after a trailing text segment.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three prerelease kinds the promotion rules know about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PrereleaseKind {
    /// Early, unstable builds.
    Alpha,
    /// Feature-complete builds still under test.
    Beta,
    /// Release candidate.
    Rc,
}

impl PrereleaseKind {
    /// All kinds, in promotion order. Variant order is promotion order too.
    pub const ALL: &'static [Self] = &[Self::Alpha, Self::Beta, Self::Rc];

    /// Tag text used in the version string.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
        }
    }

    /// Classify an existing leading prerelease segment.
    ///
    /// Matches by substring in promotion order, so `alpha1` is alpha.
    /// Returns `None` for tags outside the known kinds (e.g. `dev`).
    pub fn classify(segment: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| segment.contains(kind.as_str()))
    }
}

impl fmt::Display for PrereleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dot-separated piece of a prerelease tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An integer segment (`22` in `rc.22`).
    Numeric(u64),
    /// A text segment (`rc` in `rc.22`).
    Text(String),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed, non-empty prerelease tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrereleaseTag {
    segments: Vec<Segment>,
}

impl PrereleaseTag {
    /// Split a prerelease string into segments.
    ///
    /// Returns `None` for the empty string (no prerelease).
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return None;
        }
        let segments = text
            .split('.')
            .map(|part| {
                part.parse::<u64>()
                    .map_or_else(|_| Segment::Text(part.to_string()), Segment::Numeric)
            })
            .collect();
        Some(Self { segments })
    }

    /// The segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The leading segment, rendered as text.
    pub fn first(&self) -> String {
        self.segments
            .first()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Advance the tag: `alpha` → `alpha.0`, `alpha.0` → `alpha.1`.
    pub fn increment(&mut self) {
        match self.segments.last_mut() {
            Some(Segment::Numeric(n)) => *n += 1,
            Some(Segment::Text(_)) | None => self.segments.push(Segment::Numeric(0)),
        }
    }
}

impl fmt::Display for PrereleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}
