//! User-interaction seams.
//!
//! The core never talks to a terminal. The CLI implements these traits
//! with real prompts; tests use closures or small structs.

use camino::Utf8Path;
use thiserror::Error;

/// Errors raised by a prompt implementation.
#[derive(Error, Debug)]
pub enum PromptError {
    /// The user cancelled (Ctrl-C, Esc).
    #[error("prompt cancelled")]
    Cancelled,

    /// No terminal is available to ask on.
    #[error("prompt needs an interactive terminal")]
    NotInteractive,

    /// Any other prompt failure.
    #[error("prompt failed: {0}")]
    Failed(String),
}

/// Asks whether one file may be rewritten.
///
/// Called by writer threads, one at a time, while holding the write lock.
pub trait ConfirmChange: Send + Sync {
    /// Return `Ok(false)` to leave `path` untouched.
    fn confirm(&self, old_version: &str, new_version: &str, path: &Utf8Path)
    -> Result<bool, PromptError>;
}

impl<F> ConfirmChange for F
where
    F: Fn(&str, &str, &Utf8Path) -> Result<bool, PromptError> + Send + Sync,
{
    fn confirm(
        &self,
        old_version: &str,
        new_version: &str,
        path: &Utf8Path,
    ) -> Result<bool, PromptError> {
        self(old_version, new_version, path)
    }
}

/// Asks for the passphrase of the signing key.
pub trait PassphrasePrompt {
    /// Return the passphrase as typed.
    fn passphrase(&self) -> Result<String, PromptError>;
}

impl<F> PassphrasePrompt for F
where
    F: Fn() -> Result<String, PromptError>,
{
    fn passphrase(&self) -> Result<String, PromptError> {
        self()
    }
}
