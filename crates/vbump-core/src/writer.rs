//! Gate-blocked writer threads.
//!
//! Every occurrence gets its own scoped thread the moment it is found.
//! The thread blocks on the [`ConsistencyGate`]; on `Abort` it abstains,
//! on `Proceed` it takes the run-wide write lock, asks for confirmation,
//! re-reads the file and rewrites the single occurrence. Writes and
//! prompts never interleave.

use std::fs;
use std::io;
use std::sync::{Mutex, PoisonError};
use std::thread::{Scope, ScopedJoinHandle};

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extract::{JsonPath, Location};
use crate::gate::{ConsistencyGate, Decision};
use crate::prompt::{ConfirmChange, PromptError};
use crate::scan::Occurrence;

/// Errors from a single writer.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The confirmation prompt failed.
    #[error("confirming {path}: {source}")]
    Prompt {
        /// File being confirmed.
        path: Utf8PathBuf,
        /// Prompt failure.
        source: PromptError,
    },

    /// Re-reading the file failed.
    #[error("reading {path}: {source}")]
    Read {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Writing the file failed.
    #[error("writing {path}: {source}")]
    Write {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The occurrence is no longer where the scan found it.
    #[error("{path} changed since it was scanned ({location})")]
    Changed {
        /// File that changed.
        path: Utf8PathBuf,
        /// Expected location.
        location: Location,
    },

    /// The new JSON string literal could not be encoded.
    #[error("updating JSON in {path}: {source}")]
    Json {
        /// File that failed.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The writer thread panicked.
    #[error("writer for {path} panicked")]
    Panicked {
        /// File the writer owned.
        path: Utf8PathBuf,
    },
}

/// What one writer did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The gate aborted; nothing was touched.
    Abstained,
    /// The user declined this file.
    Declined(Utf8PathBuf),
    /// The file was rewritten.
    Updated(Utf8PathBuf),
    /// Dry run: the file would have been rewritten.
    WouldUpdate(Utf8PathBuf),
}

/// State shared by every writer in a run.
pub struct WriteContext<'env> {
    gate: &'env ConsistencyGate,
    confirm: Option<&'env dyn ConfirmChange>,
    dry_run: bool,
    lock: Mutex<()>,
}

impl std::fmt::Debug for WriteContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteContext")
            .field("confirm", &self.confirm.is_some())
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl<'env> WriteContext<'env> {
    /// Writers gated on `gate`; `confirm` of `None` auto-confirms.
    pub fn new(
        gate: &'env ConsistencyGate,
        confirm: Option<&'env dyn ConfirmChange>,
        dry_run: bool,
    ) -> Self {
        Self {
            gate,
            confirm,
            dry_run,
            lock: Mutex::new(()),
        }
    }
}

type Handle<'scope> = ScopedJoinHandle<'scope, Result<WriteOutcome, WriteError>>;

/// Spawns one writer per occurrence inside a thread scope.
pub struct WriterPool<'scope, 'env: 'scope> {
    scope: &'scope Scope<'scope, 'env>,
    context: &'env WriteContext<'env>,
    handles: Vec<(Utf8PathBuf, Handle<'scope>)>,
}

impl<'scope, 'env> WriterPool<'scope, 'env> {
    /// An empty pool bound to `scope`.
    pub const fn new(scope: &'scope Scope<'scope, 'env>, context: &'env WriteContext<'env>) -> Self {
        Self {
            scope,
            context,
            handles: Vec::new(),
        }
    }

    /// Start a writer for `occurrence`; it blocks until the gate decides.
    pub fn spawn(&mut self, occurrence: Occurrence) {
        let context = self.context;
        let path = occurrence.relative.clone();
        let handle = self.scope.spawn(move || write_occurrence(context, &occurrence));
        self.handles.push((path, handle));
    }

    /// Writers started so far.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no writer was started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every writer and collect outcomes and failures.
    pub fn join(self) -> (Vec<WriteOutcome>, Vec<WriteError>) {
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        for (path, handle) in self.handles {
            match handle.join() {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => failures.push(e),
                Err(_) => failures.push(WriteError::Panicked { path }),
            }
        }
        (outcomes, failures)
    }
}

impl std::fmt::Debug for WriterPool<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterPool")
            .field("writers", &self.handles.len())
            .finish_non_exhaustive()
    }
}

fn write_occurrence(
    context: &WriteContext<'_>,
    occurrence: &Occurrence,
) -> Result<WriteOutcome, WriteError> {
    let relative = &occurrence.relative;
    if context.gate.wait() == Decision::Abort {
        debug!(file = %relative, "gate aborted, abstaining");
        return Ok(WriteOutcome::Abstained);
    }

    let _guard = context.lock.lock().unwrap_or_else(PoisonError::into_inner);

    if context.dry_run {
        info!(file = %relative, old = %occurrence.old_version, new = %occurrence.new_version, "would update");
        return Ok(WriteOutcome::WouldUpdate(relative.clone()));
    }

    if let Some(confirm) = context.confirm {
        let accepted = confirm
            .confirm(&occurrence.old_version, &occurrence.new_version, relative)
            .map_err(|source| WriteError::Prompt {
                path: relative.clone(),
                source,
            })?;
        if !accepted {
            info!(file = %relative, "change declined");
            return Ok(WriteOutcome::Declined(relative.clone()));
        }
    }

    let content = fs::read_to_string(&occurrence.path).map_err(|source| WriteError::Read {
        path: relative.clone(),
        source,
    })?;

    let updated = match &occurrence.location {
        Location::Line { index, start, end } => replace_in_line(
            &content,
            *index,
            *start..*end,
            &occurrence.raw,
            &occurrence.old_version,
            &occurrence.new_version,
        ),
        Location::JsonField(path) => {
            replace_json_field(&content, path, &occurrence.raw, &occurrence.new_version)
                .map_err(|source| WriteError::Json {
                    path: relative.clone(),
                    source,
                })?
        }
    };
    let Some(updated) = updated else {
        warn!(file = %relative, location = %occurrence.location, "occurrence moved");
        return Err(WriteError::Changed {
            path: relative.clone(),
            location: occurrence.location.clone(),
        });
    };

    fs::write(&occurrence.path, updated).map_err(|source| WriteError::Write {
        path: relative.clone(),
        source,
    })?;
    info!(file = %relative, old = %occurrence.old_version, new = %occurrence.new_version, "updated");
    Ok(WriteOutcome::Updated(relative.clone()))
}

/// Swap the version inside one line, keeping everything else byte-for-byte.
///
/// Returns `None` if the line no longer holds `raw` at `span`.
fn replace_in_line(
    content: &str,
    index: usize,
    span: std::ops::Range<usize>,
    raw: &str,
    old_version: &str,
    new_version: &str,
) -> Option<String> {
    let mut out = String::with_capacity(content.len() + new_version.len());
    let mut replaced = false;
    for (i, line) in content.split_inclusive('\n').enumerate() {
        if i != index {
            out.push_str(line);
            continue;
        }
        if line.get(span.clone())? != raw {
            return None;
        }
        // keep any `v` prefix the file uses
        let replacement = if raw.contains(old_version) {
            raw.replacen(old_version, new_version, 1)
        } else {
            new_version.to_string()
        };
        out.push_str(&line[..span.start]);
        out.push_str(&replacement);
        out.push_str(&line[span.end..]);
        replaced = true;
    }
    replaced.then_some(out)
}

/// Swap the string literal at `path`, leaving every other byte as it was.
///
/// Returns `Ok(None)` if the field is gone or no longer holds `raw`.
fn replace_json_field(
    content: &str,
    path: &JsonPath,
    raw: &str,
    new_version: &str,
) -> Result<Option<String>, serde_json::Error> {
    let Some(span) = path.span(content) else {
        return Ok(None);
    };
    if serde_json::from_str::<String>(&content[span.clone()]).ok().as_deref() != Some(raw) {
        return Ok(None);
    }
    let literal = serde_json::to_string(new_version)?;
    let mut out = String::with_capacity(content.len() + literal.len());
    out.push_str(&content[..span.start]);
    out.push_str(&literal);
    out.push_str(&content[span.end..]);
    Ok(Some(out))
}

/// Paths of every updated (or would-be-updated) file, in outcome order.
pub fn touched_paths(outcomes: &[WriteOutcome]) -> Vec<Utf8PathBuf> {
    outcomes
        .iter()
        .filter_map(|o| match o {
            WriteOutcome::Updated(p) | WriteOutcome::WouldUpdate(p) => Some(p.clone()),
            WriteOutcome::Abstained | WriteOutcome::Declined(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use std::thread;
    use tempfile::TempDir;

    fn occurrence(root: &Utf8Path, name: &str, location: Location, raw: &str) -> Occurrence {
        Occurrence {
            path: root.join(name),
            relative: Utf8PathBuf::from(name),
            directory: ".".into(),
            technology: "test".into(),
            location,
            raw: raw.into(),
            old_version: "1.0.0".into(),
            new_version: "1.1.0".into(),
        }
    }

    fn line(index: usize, start: usize, end: usize) -> Location {
        Location::Line { index, start, end }
    }

    #[test]
    fn line_replacement_keeps_prefix_and_endings() {
        let content = "a\r\nversion = \"v1.0.0\"\r\nb";
        let out = replace_in_line(content, 1, 11..17, "v1.0.0", "1.0.0", "1.1.0").unwrap();
        assert_eq!(out, "a\r\nversion = \"v1.1.0\"\r\nb");
    }

    #[test]
    fn line_replacement_detects_drift() {
        let content = "version = \"2.0.0\"\n";
        assert!(replace_in_line(content, 0, 11..16, "1.0.0", "1.0.0", "1.1.0").is_none());
        assert!(replace_in_line(content, 5, 0..1, "v", "1.0.0", "1.1.0").is_none());
    }

    #[test]
    fn json_replacement_touches_only_the_literal() {
        let content = "{\"name\":\"caf\\u00e9\",\"files\": [\"dist\", \"lib\"],\"version\":\"1.0.0\"}";
        let out = replace_json_field(content, &JsonPath::parse("version"), "1.0.0", "1.0.1")
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            "{\"name\":\"caf\\u00e9\",\"files\": [\"dist\", \"lib\"],\"version\":\"1.0.1\"}"
        );
    }

    #[test]
    fn json_replacement_keeps_layout_and_trailing_newline() {
        let content = "{\n    \"name\": \"x\",\n    \"version\": \"1.0.0\",\n    \"private\": true\n}\n";
        let out = replace_json_field(content, &JsonPath::parse("version"), "1.0.0", "1.1.0")
            .unwrap()
            .unwrap();
        assert_eq!(
            out,
            "{\n    \"name\": \"x\",\n    \"version\": \"1.1.0\",\n    \"private\": true\n}\n"
        );
    }

    #[test]
    fn json_replacement_missing_or_moved_field() {
        let path = JsonPath::parse("version");
        assert!(replace_json_field("{}", &path, "1.0.0", "1.1.0").unwrap().is_none());
        let moved = r#"{"version": "1.0.1"}"#;
        assert!(replace_json_field(moved, &path, "1.0.0", "1.1.0").unwrap().is_none());
        let not_a_string = r#"{"version": 1}"#;
        assert!(replace_json_field(not_a_string, &path, "1.0.0", "1.1.0").unwrap().is_none());
    }

    #[test]
    fn abort_means_abstain() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join("f"), "1.0.0\n").unwrap();

        let gate = ConsistencyGate::new();
        let context = WriteContext::new(&gate, None, false);
        let (outcomes, failures) = thread::scope(|s| {
            let mut pool = WriterPool::new(s, &context);
            pool.spawn(occurrence(&root, "f", line(0, 0, 5), "1.0.0"));
            gate.abort();
            pool.join()
        });
        assert!(failures.is_empty());
        assert_eq!(outcomes, vec![WriteOutcome::Abstained]);
        assert_eq!(fs::read_to_string(root.join("f")).unwrap(), "1.0.0\n");
    }

    #[test]
    fn proceed_writes_and_declines_are_respected() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join("keep"), "1.0.0\n").unwrap();
        fs::write(root.join("skip"), "1.0.0\n").unwrap();

        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        let confirm =
            |_: &str, _: &str, path: &Utf8Path| Ok::<_, PromptError>(path.as_str() == "keep");
        let context = WriteContext::new(&gate, Some(&confirm), false);
        let (mut outcomes, failures) = thread::scope(|s| {
            let mut pool = WriterPool::new(s, &context);
            pool.spawn(occurrence(&root, "keep", line(0, 0, 5), "1.0.0"));
            pool.spawn(occurrence(&root, "skip", line(0, 0, 5), "1.0.0"));
            gate.decide();
            pool.join()
        });
        outcomes.sort_by_key(|o| format!("{o:?}"));
        assert!(failures.is_empty());
        assert_eq!(
            outcomes,
            vec![
                WriteOutcome::Declined("skip".into()),
                WriteOutcome::Updated("keep".into()),
            ]
        );
        assert_eq!(fs::read_to_string(root.join("keep")).unwrap(), "1.1.0\n");
        assert_eq!(fs::read_to_string(root.join("skip")).unwrap(), "1.0.0\n");
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        fs::write(root.join("f"), "1.0.0\n").unwrap();

        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        let context = WriteContext::new(&gate, None, true);
        let (outcomes, _) = thread::scope(|s| {
            let mut pool = WriterPool::new(s, &context);
            pool.spawn(occurrence(&root, "f", line(0, 0, 5), "1.0.0"));
            gate.decide();
            pool.join()
        });
        assert_eq!(outcomes, vec![WriteOutcome::WouldUpdate("f".into())]);
        assert_eq!(touched_paths(&outcomes), vec![Utf8PathBuf::from("f")]);
        assert_eq!(fs::read_to_string(root.join("f")).unwrap(), "1.0.0\n");
    }

    #[test]
    fn missing_file_is_collected_as_failure() {
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();

        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        let context = WriteContext::new(&gate, None, false);
        let (outcomes, failures) = thread::scope(|s| {
            let mut pool = WriterPool::new(s, &context);
            pool.spawn(occurrence(&root, "gone", line(0, 0, 5), "1.0.0"));
            gate.decide();
            pool.join()
        });
        assert!(outcomes.is_empty());
        assert!(matches!(failures.as_slice(), [WriteError::Read { .. }]));
    }
}
