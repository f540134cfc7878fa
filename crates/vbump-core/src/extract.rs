//! Per-technology version extractors.
//!
//! A technology knows which files may embed the version (file-name globs)
//! and how to find it inside them: an ordered list of regular expressions
//! with a `version` named group, or an ordered list of JSON field paths.
//! Three technologies are built in; any other configured name is generic
//! and looks for the first semver-looking substring on a line.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::scan::{ScanError, ScanResult};
use crate::version::{VERSION_PATTERN, VersionResult, VersionValue};

/// A built-in technology with known files and detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Builtin {
    /// Container images (`Dockerfile` OCI labels).
    Docker,
    /// Go sources (`const Version = "..."`).
    Go,
    /// npm manifests (`package.json`, `package-lock.json`).
    #[serde(rename = "javascript")]
    JavaScript,
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Builtin {
    /// All built-in technologies, in scan order.
    pub const ALL: &'static [Self] = &[Self::Docker, Self::Go, Self::JavaScript];

    /// Config section name.
    pub const fn id(self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Go => "go",
            Self::JavaScript => "javascript",
        }
    }

    /// Look up a built-in by config name, ignoring case.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|b| b.id().eq_ignore_ascii_case(id))
    }

    /// File-name globs scanned when the config does not override them.
    pub const fn default_files(self) -> &'static [&'static str] {
        match self {
            Self::Docker => &["Dockerfile"],
            Self::Go => &["*.go"],
            Self::JavaScript => &["package.json", "package-lock.json"],
        }
    }

    /// Default line patterns (empty for JSON-based technologies).
    pub fn default_patterns(self) -> Vec<String> {
        let v = VERSION_PATTERN;
        match self {
            Self::Docker => vec![
                format!(r#"^LABEL .*org\.opencontainers\.image\.version['"= ]*(?P<version>{v})['"]?.*"#),
                format!(r#"^\s*['"]?org\.opencontainers\.image\.version['"= ]*(?P<version>{v})['"]?.*"#),
            ],
            Self::Go => vec![
                format!(r#"^const [vV]ersion\s*string = "(?P<version>{v})""#),
                format!(r#"^const [vV]ersion := "(?P<version>{v})""#),
                format!(r#"^\s*[vV]ersion\s*string = "(?P<version>{v})""#),
            ],
            Self::JavaScript => Vec::new(),
        }
    }

    /// Default JSON field paths (empty for line-based technologies).
    pub fn default_json_fields(self) -> Vec<String> {
        match self {
            Self::JavaScript => vec!["version".to_string()],
            Self::Docker | Self::Go => Vec::new(),
        }
    }
}

/// Pattern used by generic technologies when no regex is configured.
pub fn generic_pattern() -> String {
    format!(r#"^.*?["']?(?P<version>{VERSION_PATTERN})["']?"#)
}

/// Resolved settings for one technology, read-only for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechnologyConfig {
    /// Technology name (`docker`, `go`, `javascript`, or a generic name).
    pub id: String,
    /// Whether the technology takes part in the run.
    pub enabled: bool,
    /// Directories to scan, relative to the project root.
    pub directories: Vec<String>,
    /// Include globs on file names, overriding the built-in defaults.
    pub files: Option<Vec<String>>,
    /// Exclude globs on root-relative paths or file names.
    pub exclude_files: Vec<String>,
    /// Line patterns overriding the built-in detectors.
    pub regex: Option<Vec<String>>,
    /// JSON field paths overriding the built-in detectors.
    pub json_fields: Option<Vec<String>>,
}

impl TechnologyConfig {
    /// An enabled technology scanning only the project root.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            directories: vec![".".to_string()],
            files: None,
            exclude_files: Vec::new(),
            regex: None,
            json_fields: None,
        }
    }

    /// The built-in this config refers to, if any.
    pub fn builtin(&self) -> Option<Builtin> {
        Builtin::from_id(&self.id)
    }
}

// ──────────────────────────────────────────────
// JSON paths
// ──────────────────────────────────────────────

/// A dot-separated path into a JSON document.
///
/// Integer segments index arrays and `\.` is a literal dot inside a key,
/// so `dependencies.@scope/pkg\.js.version` has three segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    raw: String,
    segments: Vec<String>,
}

impl JsonPath {
    /// Split a path on unescaped dots.
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'.') => {
                    current.push('.');
                    chars.next();
                }
                '.' => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// The path as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve the path against a document.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments.iter().try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Byte range of the value at this path, exactly as written in `content`.
    ///
    /// Duplicate keys resolve to the last one, like [`get`](Self::get).
    pub fn span(&self, content: &str) -> Option<Range<usize>> {
        let mut node: &RawValue = serde_json::from_str(content).ok()?;
        for segment in &self.segments {
            let text = node.get();
            node = if text.starts_with('[') {
                let items: Vec<&RawValue> = serde_json::from_str(text).ok()?;
                *items.get(segment.parse::<usize>().ok()?)?
            } else {
                let mut fields: HashMap<String, &RawValue> = serde_json::from_str(text).ok()?;
                fields.remove(segment)?
            };
        }
        let text = node.get();
        let start = (text.as_ptr() as usize).checked_sub(content.as_ptr() as usize)?;
        Some(start..start + text.len())
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// ──────────────────────────────────────────────
// Extractor
// ──────────────────────────────────────────────

/// How an extractor finds the version inside a file.
#[derive(Debug, Clone)]
pub enum Detector {
    /// Line patterns, tried per line in order.
    Patterns(Vec<Regex>),
    /// JSON paths, tried in order against the whole document.
    JsonFields(Vec<JsonPath>),
}

/// Where an occurrence sits inside its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A byte span of the captured version within a line.
    Line {
        /// Zero-based line index.
        index: usize,
        /// Start of the capture within the line.
        start: usize,
        /// End of the capture within the line.
        end: usize,
    },
    /// A string field of a JSON document.
    JsonField(JsonPath),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line { index, .. } => write!(f, "line {}", index + 1),
            Self::JsonField(path) => write!(f, "field {path}"),
        }
    }
}

/// The first version found in a file.
#[derive(Debug, Clone)]
pub struct Found {
    /// Where it was found.
    pub location: Location,
    /// The text exactly as it appears in the file (may carry a `v`).
    pub raw: String,
    /// The parsed version.
    pub version: VersionValue,
}

/// A compiled technology: file filters plus a detector.
#[derive(Debug, Clone)]
pub struct Extractor {
    id: String,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    detector: Detector,
}

impl Extractor {
    /// Compile a technology config, filling gaps from the built-in defaults.
    pub fn from_config(config: &TechnologyConfig) -> ScanResult<Self> {
        let builtin = config.builtin();

        let include_globs: Vec<String> = match (&config.files, builtin) {
            (Some(files), _) if !files.is_empty() => files.clone(),
            (_, Some(b)) => b.default_files().iter().map(ToString::to_string).collect(),
            _ => vec!["*".to_string()],
        };

        let detector = if let Some(patterns) = config.regex.as_ref().filter(|p| !p.is_empty()) {
            Detector::Patterns(compile_patterns(patterns)?)
        } else if let Some(fields) = config.json_fields.as_ref().filter(|f| !f.is_empty()) {
            Detector::JsonFields(fields.iter().map(|f| JsonPath::parse(f)).collect())
        } else {
            match builtin {
                Some(Builtin::JavaScript) => Detector::JsonFields(
                    Builtin::JavaScript
                        .default_json_fields()
                        .iter()
                        .map(|f| JsonPath::parse(f))
                        .collect(),
                ),
                Some(b) => Detector::Patterns(compile_patterns(&b.default_patterns())?),
                None => Detector::Patterns(compile_patterns(&[generic_pattern()])?),
            }
        };

        Ok(Self {
            id: config.id.clone(),
            include: compile_globs(&include_globs)?,
            exclude: compile_globs(&config.exclude_files)?,
            detector,
        })
    }

    /// Technology name.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The compiled detector.
    pub const fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Whether a file name matches one of the include globs.
    pub fn includes(&self, file_name: &str) -> bool {
        self.include.iter().any(|p| p.matches(file_name))
    }

    /// Whether a file is excluded, by root-relative path or by name.
    pub fn excludes(&self, relative_path: &str, file_name: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches(relative_path) || p.matches(file_name))
    }

    /// Find the first version occurrence in `content`.
    ///
    /// Returns `Ok(None)` when nothing matches. A match whose text is not a
    /// valid version is an error rather than a miss.
    pub fn locate(&self, content: &str) -> VersionResult<Option<Found>> {
        match &self.detector {
            Detector::Patterns(patterns) => locate_line(patterns, content),
            Detector::JsonFields(paths) => locate_json(paths, content),
        }
    }
}

fn locate_line(patterns: &[Regex], content: &str) -> VersionResult<Option<Found>> {
    for (index, line) in content.lines().enumerate() {
        for pattern in patterns {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };
            let version = VersionValue::parse_from_pattern(line, pattern)?;
            // parse_from_pattern guarantees the group is present
            let Some(m) = caps.name("version") else {
                continue;
            };
            return Ok(Some(Found {
                location: Location::Line {
                    index,
                    start: m.start(),
                    end: m.end(),
                },
                raw: m.as_str().to_string(),
                version,
            }));
        }
    }
    Ok(None)
}

fn locate_json(paths: &[JsonPath], content: &str) -> VersionResult<Option<Found>> {
    let Ok(document) = serde_json::from_str::<Value>(content) else {
        tracing::debug!("content is not valid JSON");
        return Ok(None);
    };
    for path in paths {
        let Some(text) = path.get(&document).and_then(Value::as_str) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        let version = VersionValue::parse(text)?;
        return Ok(Some(Found {
            location: Location::JsonField(path.clone()),
            raw: text.to_string(),
            version,
        }));
    }
    Ok(None)
}

fn compile_patterns(patterns: &[String]) -> ScanResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| ScanError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

fn compile_globs(globs: &[String]) -> ScanResult<Vec<Pattern>> {
    globs
        .iter()
        .map(|g| {
            Pattern::new(g).map_err(|source| ScanError::InvalidGlob {
                glob: g.clone(),
                source,
            })
        })
        .collect()
}
