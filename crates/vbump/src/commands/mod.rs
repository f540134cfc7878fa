//! Command implementations

pub mod bump;

pub mod doctor;

pub mod info;

use std::io::IsTerminal;

use camino::Utf8Path;
use inquire::error::InquireError;
use inquire::{Confirm, Password, PasswordDisplayMode};
use owo_colors::OwoColorize;

use vbump_core::prompt::{ConfirmChange, PassphrasePrompt, PromptError};

/// Whether stdin is attached to a terminal we can prompt on.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Asks `old -> new path` on the terminal before each file is rewritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

impl ConfirmChange for TerminalConfirm {
    fn confirm(
        &self,
        old_version: &str,
        new_version: &str,
        path: &Utf8Path,
    ) -> Result<bool, PromptError> {
        let message = format!(
            "{} -> {} {}",
            old_version.dimmed(),
            new_version.green(),
            path.cyan()
        );
        Confirm::new(&message)
            .with_default(true)
            .prompt()
            .map_err(prompt_error)
    }
}

/// Masked prompt for the signing-key passphrase.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPassphrase;

impl PassphrasePrompt for TerminalPassphrase {
    fn passphrase(&self) -> Result<String, PromptError> {
        Password::new("GPG passphrase:")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .map_err(prompt_error)
    }
}

/// Map an inquire failure onto the core's prompt error.
pub fn prompt_error(error: InquireError) -> PromptError {
    match error {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            PromptError::Cancelled
        }
        InquireError::NotTTY => PromptError::NotInteractive,
        other => PromptError::Failed(other.to_string()),
    }
}
