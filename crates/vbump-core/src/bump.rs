//! Version bump orchestration.
//!
//! All orchestration logic lives here. The CLI is purely a display layer.
//!
//! # Run phases
//!
//! 1. **Scan** — every enabled technology is scanned in order. Each
//!    occurrence that changes records its old version in the
//!    [`ConsistencyGate`] and gets a writer thread that blocks on the gate.
//! 2. **Decide** — once scanning is over the gate decides: exactly one
//!    distinct old version means proceed, anything else aborts.
//! 3. **Write** — writers confirm and rewrite their file one at a time;
//!    the pipeline joins all of them before looking at the results.
//! 4. **Save** — modified files are committed and tagged, after the
//!    signing key (if any) has been unlocked.

use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::extract::TechnologyConfig;
use crate::gate::{ConsistencyGate, Verdict};
use crate::git::{GitError, Repository};
use crate::gpg::{GpgKeyring, KeyUnlocker, SigningKey};
use crate::prompt::{ConfirmChange, PassphrasePrompt, PromptError};
use crate::scan::{ScanError, Scanner};
use crate::version::{BumpRequest, VersionError, VersionValue};
use crate::writer::{WriteContext, WriteError, WriteOutcome, WriterPool, touched_paths};

/// How many passphrases are tried before giving up.
pub const MAX_PASSPHRASE_ATTEMPTS: usize = 3;

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from a bump run.
#[derive(Error, Debug)]
pub enum BumpError {
    /// Scanning one technology failed.
    #[error("incrementing version in {technology} project: {source}")]
    Technology {
        /// Technology being scanned.
        technology: String,
        /// Underlying scan error.
        source: ScanError,
    },

    /// No occurrence would change.
    #[error("0 files updated")]
    ZeroFilesUpdated,

    /// Occurrences disagree on the current version.
    #[error("inconsistent versioning {}", versions.join(","))]
    InconsistentVersioning {
        /// Distinct old versions, sorted.
        versions: Vec<String>,
    },

    /// One or more writers failed; other files may have been written.
    #[error("{} file(s) could not be updated: {}", .0.len(), first_failure(.0))]
    WritesFailed(Vec<WriteError>),

    /// Every passphrase attempt was rejected.
    #[error("validating gpg signing key")]
    SigningKeyValidationFailed,

    /// Reading the signing configuration failed.
    #[error("retrieving gpg configuration: {0}")]
    SigningConfig(#[source] GitError),

    /// A prompt failed.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Committing or tagging failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Computing the resulting version failed.
    #[error(transparent)]
    Version(#[from] VersionError),
}

fn first_failure(failures: &[WriteError]) -> String {
    failures.first().map(ToString::to_string).unwrap_or_default()
}

/// Result alias for bump operations.
pub type BumpResult<T> = Result<T, BumpError>;

// ──────────────────────────────────────────────
// Options and results
// ──────────────────────────────────────────────

/// Per-run switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// What to bump.
    pub request: BumpRequest,
    /// Report what would change without writing.
    pub dry_run: bool,
    /// Commit and tag modified files.
    pub commit: bool,
    /// Sign the commit and tag when the repository asks for it.
    pub sign: bool,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Files rewritten (or that would be, in a dry run), root-relative.
    pub modified_files: Vec<Utf8PathBuf>,
    /// Files the user declined.
    pub declined_files: Vec<Utf8PathBuf>,
    /// Version found in every occurrence.
    pub previous_version: String,
    /// Resulting version.
    pub version: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Whether a commit and tag were created.
    pub committed: bool,
}

// ──────────────────────────────────────────────
// Bumper
// ──────────────────────────────────────────────

/// Runs a bump over a project root with pluggable collaborators.
pub struct Bumper<'a> {
    root: &'a Utf8Path,
    technologies: &'a [TechnologyConfig],
    confirm: Option<&'a dyn ConfirmChange>,
    passphrase: Option<&'a dyn PassphrasePrompt>,
    repository: Option<&'a dyn Repository>,
    unlocker: Option<&'a dyn KeyUnlocker>,
}

impl std::fmt::Debug for Bumper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bumper")
            .field("root", &self.root)
            .field("technologies", &self.technologies)
            .field("confirm", &self.confirm.is_some())
            .field("passphrase", &self.passphrase.is_some())
            .field("repository", &self.repository.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> Bumper<'a> {
    /// A bumper with no prompts and no repository.
    pub const fn new(root: &'a Utf8Path, technologies: &'a [TechnologyConfig]) -> Self {
        Self {
            root,
            technologies,
            confirm: None,
            passphrase: None,
            repository: None,
            unlocker: None,
        }
    }

    /// Ask before each file is rewritten.
    pub const fn with_confirm(mut self, confirm: &'a dyn ConfirmChange) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Ask for the signing-key passphrase.
    pub const fn with_passphrase_prompt(mut self, prompt: &'a dyn PassphrasePrompt) -> Self {
        self.passphrase = Some(prompt);
        self
    }

    /// Commit and tag through `repository`.
    pub const fn with_repository(mut self, repository: &'a dyn Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Validate passphrases with `unlocker` instead of the local gpg keyring.
    pub const fn with_key_unlocker(mut self, unlocker: &'a dyn KeyUnlocker) -> Self {
        self.unlocker = Some(unlocker);
        self
    }

    /// Scan, decide, write, then commit.
    #[instrument(skip_all, fields(root = %self.root, dry_run = options.dry_run))]
    pub fn run(&self, options: &RunOptions) -> BumpResult<RunResult> {
        let gate = ConsistencyGate::new();
        let context = WriteContext::new(&gate, self.confirm, options.dry_run);
        let scanner = Scanner::new(self.root, &options.request);

        let (scanned, verdict, outcomes, failures) = thread::scope(|s| {
            let mut pool = WriterPool::new(s, &context);
            let mut scanned = Ok(());
            for technology in self.technologies.iter().filter(|t| t.enabled) {
                if let Err(source) = scanner.scan(technology, &gate, &mut |o| pool.spawn(o)) {
                    scanned = Err(BumpError::Technology {
                        technology: technology.id.clone(),
                        source,
                    });
                    break;
                }
            }

            let verdict = if scanned.is_ok() {
                Some(gate.decide())
            } else {
                gate.abort();
                None
            };
            debug!(writers = pool.len(), "joining writers");
            let (outcomes, failures) = pool.join();
            (scanned, verdict, outcomes, failures)
        });
        scanned?;

        let previous_version = match verdict {
            Some(Verdict::Consistent(version)) => version,
            Some(Verdict::Inconsistent(versions)) => {
                return Err(BumpError::InconsistentVersioning { versions });
            }
            Some(Verdict::Empty) | None => return Err(BumpError::ZeroFilesUpdated),
        };
        if !failures.is_empty() {
            return Err(BumpError::WritesFailed(failures));
        }

        let mut next = VersionValue::parse(&previous_version)?;
        options.request.apply(&mut next)?;
        let version = next.to_string();

        let modified_files = touched_paths(&outcomes);
        let declined_files = outcomes
            .iter()
            .filter_map(|o| match o {
                WriteOutcome::Declined(p) => Some(p.clone()),
                _ => None,
            })
            .collect();

        let mut committed = false;
        if !options.dry_run
            && options.commit
            && !modified_files.is_empty()
            && let Some(repository) = self.repository
        {
            let key = if options.sign {
                self.resolve_signing_key(repository)?
            } else {
                None
            };
            repository.save(&modified_files, &version, key.as_ref())?;
            committed = true;
        }

        info!(
            %previous_version,
            %version,
            files = modified_files.len(),
            committed,
            "bump complete"
        );
        Ok(RunResult {
            modified_files,
            declined_files,
            previous_version,
            version,
            dry_run: options.dry_run,
            committed,
        })
    }

    /// Look up the signing key and unlock it, retrying the passphrase.
    ///
    /// Without a passphrase prompt the key is handed to git as-is and the
    /// gpg agent is left to unlock it.
    fn resolve_signing_key(&self, repository: &dyn Repository) -> BumpResult<Option<SigningKey>> {
        let Some(key_id) = repository
            .signing_key()
            .map_err(BumpError::SigningConfig)?
        else {
            return Ok(None);
        };
        let Some(prompt) = self.passphrase else {
            debug!(%key_id, "no passphrase prompt, deferring to gpg agent");
            return Ok(Some(SigningKey::new(key_id)));
        };

        let keyring = GpgKeyring::new();
        let unlocker: &dyn KeyUnlocker = match self.unlocker {
            Some(unlocker) => unlocker,
            None => &keyring,
        };

        for attempt in 1..=MAX_PASSPHRASE_ATTEMPTS {
            let passphrase = prompt.passphrase()?;
            match unlocker.unlock(&key_id, &passphrase) {
                Ok(key) => return Ok(Some(key)),
                Err(e) => warn!(attempt, error = %e, "passphrase rejected"),
            }
        }
        Err(BumpError::SigningKeyValidationFailed)
    }
}
