//! Directory scanning for version occurrences.
//!
//! For one technology the scanner lists each configured directory (not
//! recursively), filters files by the extractor's globs, reads each file
//! and locates the first occurrence. Occurrences whose version actually
//! changes are recorded in the [`ConsistencyGate`] and handed to the
//! caller's dispatch function, which normally spawns a writer. A file is
//! dispatched at most once per scanner, however many directories or
//! technologies reach it.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::extract::{Extractor, Location, TechnologyConfig};
use crate::gate::ConsistencyGate;
use crate::version::{BumpRequest, VersionError};

/// Errors raised while scanning.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A configured directory could not be listed.
    #[error("listing directory {dir}: {source}")]
    ListDirectory {
        /// Directory that failed.
        dir: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A candidate file could not be read.
    #[error("reading {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A matched version could not be parsed.
    #[error("parsing version in {path}: {source}")]
    Parse {
        /// File containing the match.
        path: Utf8PathBuf,
        /// Underlying version error.
        source: VersionError,
    },

    /// The requested bump is not possible from the found version.
    #[error("bumping version in {path}: {source}")]
    Increment {
        /// File containing the version.
        path: Utf8PathBuf,
        /// Underlying version error.
        source: VersionError,
    },

    /// A configured regular expression does not compile.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern source.
        pattern: String,
        /// Compiler error.
        source: regex::Error,
    },

    /// A configured file glob does not compile.
    #[error("invalid glob {glob:?}: {source}")]
    InvalidGlob {
        /// Glob source.
        glob: String,
        /// Compiler error.
        source: glob::PatternError,
    },
}

/// Result alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// One version occurrence that will change.
#[derive(Debug, Clone)]
pub struct Occurrence {
    /// Path on disk (project root joined with `relative`).
    pub path: Utf8PathBuf,
    /// Path relative to the project root, as reported to the user and git.
    pub relative: Utf8PathBuf,
    /// Configured directory the file was found in.
    pub directory: String,
    /// Technology that found it.
    pub technology: String,
    /// Where in the file.
    pub location: Location,
    /// Text as it appears in the file.
    pub raw: String,
    /// Canonical old version.
    pub old_version: String,
    /// Canonical new version.
    pub new_version: String,
}

/// Counts for one technology scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Files that passed the include/exclude filters.
    pub candidates: usize,
    /// Files where a version was found.
    pub identified: usize,
    /// Occurrences dispatched for writing.
    pub dispatched: usize,
}

/// Walks technology directories under a project root.
#[derive(Debug)]
pub struct Scanner<'a> {
    root: &'a Utf8Path,
    request: &'a BumpRequest,
    dispatched: RefCell<BTreeSet<Utf8PathBuf>>,
}

impl<'a> Scanner<'a> {
    /// A scanner for `root` applying `request` to every version found.
    pub const fn new(root: &'a Utf8Path, request: &'a BumpRequest) -> Self {
        Self {
            root,
            request,
            dispatched: RefCell::new(BTreeSet::new()),
        }
    }

    /// Scan every directory of one technology.
    ///
    /// Each occurrence that changes is recorded in `gate` before it is
    /// passed to `dispatch`. The first error stops the scan.
    #[instrument(skip_all, fields(technology = %technology.id))]
    pub fn scan(
        &self,
        technology: &TechnologyConfig,
        gate: &ConsistencyGate,
        dispatch: &mut dyn FnMut(Occurrence),
    ) -> ScanResult<ScanSummary> {
        let extractor = Extractor::from_config(technology)?;
        let mut summary = ScanSummary::default();

        let root_only = vec![String::from(".")];
        let directories = if technology.directories.is_empty() {
            &root_only
        } else {
            &technology.directories
        };

        for directory in directories {
            let before = summary;
            self.scan_directory(&extractor, directory, gate, dispatch, &mut summary)?;
            if summary.candidates > before.candidates && summary.identified == before.identified {
                warn!(%directory, "version was not identified");
            }
        }

        info!(
            candidates = summary.candidates,
            dispatched = summary.dispatched,
            "scan complete"
        );
        Ok(summary)
    }

    fn scan_directory(
        &self,
        extractor: &Extractor,
        directory: &str,
        gate: &ConsistencyGate,
        dispatch: &mut dyn FnMut(Occurrence),
        summary: &mut ScanSummary,
    ) -> ScanResult<()> {
        let dir = self.root.join(directory);
        debug!(%dir, "listing directory");

        for name in list_files(&dir)? {
            let relative = relative_path(directory, &name);
            if extractor.excludes(relative.as_str(), &name) {
                debug!(file = %relative, "excluded");
                continue;
            }
            if !extractor.includes(&name) {
                continue;
            }
            summary.candidates += 1;

            let path = dir.join(&name);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(file = %relative, "not UTF-8 text, skipping");
                    continue;
                }
                Err(source) => return Err(ScanError::Read { path, source }),
            };

            let found = extractor
                .locate(&content)
                .map_err(|source| ScanError::Parse {
                    path: path.clone(),
                    source,
                })?;
            let Some(found) = found else {
                debug!(file = %relative, "version was not identified");
                continue;
            };
            summary.identified += 1;

            let old_version = found.version.to_string();
            let mut next = found.version.clone();
            self.request
                .apply(&mut next)
                .map_err(|source| ScanError::Increment {
                    path: path.clone(),
                    source,
                })?;
            let new_version = next.to_string();

            if old_version == new_version {
                debug!(file = %relative, %old_version, "version unchanged, skipping");
                continue;
            }

            // canonical form folds `./`, `..` and symlinks onto one key
            let key = path.canonicalize_utf8().unwrap_or_else(|_| path.clone());
            if !self.dispatched.borrow_mut().insert(key) {
                debug!(file = %relative, "already dispatched, skipping");
                continue;
            }

            debug!(file = %relative, %old_version, %new_version, location = %found.location, "occurrence found");
            gate.record(&old_version);
            dispatch(Occurrence {
                path,
                relative,
                directory: directory.to_string(),
                technology: extractor.id().to_string(),
                location: found.location,
                raw: found.raw,
                old_version,
                new_version,
            });
            summary.dispatched += 1;
        }
        Ok(())
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn list_files(dir: &Utf8Path) -> ScanResult<Vec<String>> {
    let list_err = |source| ScanError::ListDirectory {
        dir: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        if !entry.file_type().map_err(list_err)?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(name) => debug!(?name, "skipping non-UTF-8 file name"),
        }
    }
    names.sort();
    Ok(names)
}

fn relative_path(directory: &str, name: &str) -> Utf8PathBuf {
    let directory = directory.trim_start_matches("./").trim_end_matches('/');
    if directory.is_empty() || directory == "." {
        Utf8PathBuf::from(name)
    } else {
        Utf8Path::new(directory).join(name)
    }
}
