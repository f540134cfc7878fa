//! Signing-key unlocking through the local `gpg` keyring.
//!
//! A passphrase is checked by exporting the secret key with loopback
//! pinentry. Success proves the passphrase and leaves it cached in
//! `gpg-agent`, so the `git commit -S` and `git tag -s` that follow sign
//! without prompting again.

use std::io::Write;
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from gpg operations.
#[derive(Error, Debug)]
pub enum GpgError {
    /// Failed to execute the `gpg` command.
    #[error("failed to run gpg: {0}")]
    Exec(#[from] std::io::Error),

    /// The key could not be unlocked with the given passphrase.
    #[error("could not unlock key {key_id}: {stderr}")]
    Unlock {
        /// Key that was tried.
        key_id: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for gpg operations.
pub type GpgResult<T> = Result<T, GpgError>;

/// A key whose passphrase has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKey {
    key_id: String,
}

impl SigningKey {
    /// Wrap a key id that is known to be usable.
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
        }
    }

    /// The key id as configured in `user.signingkey`.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// Validates a passphrase against a signing key.
pub trait KeyUnlocker {
    /// Return the unlocked key, or an error if the passphrase is wrong.
    fn unlock(&self, key_id: &str, passphrase: &str) -> GpgResult<SigningKey>;
}

/// [`KeyUnlocker`] backed by the `gpg` binary on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct GpgKeyring {
    program: Option<String>,
}

impl GpgKeyring {
    /// Use `gpg` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific gpg executable (e.g. `gpg2`).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    fn program(&self) -> &str {
        self.program.as_deref().unwrap_or("gpg")
    }
}

impl KeyUnlocker for GpgKeyring {
    #[instrument(skip(self, passphrase))]
    fn unlock(&self, key_id: &str, passphrase: &str) -> GpgResult<SigningKey> {
        let mut child = Command::new(self.program())
            .args([
                "--batch",
                "--armor",
                "--pinentry-mode=loopback",
                "--passphrase-fd",
                "0",
                "--export-secret-keys",
                key_id,
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(passphrase.as_bytes())?;
            stdin.write_all(b"\n")?;
        }
        let output = child.wait_with_output()?;

        // gpg exits 0 with empty output for unknown keys
        if output.status.success() && !output.stdout.is_empty() {
            debug!("signing key unlocked");
            Ok(SigningKey::new(key_id))
        } else {
            Err(GpgError::Unlock {
                key_id: key_id.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Check whether a `gpg` binary is on `PATH`.
pub fn is_available() -> bool {
    which::which("gpg").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_key_exposes_id() {
        let key = SigningKey::new("ABCDEF0123456789");
        assert_eq!(key.key_id(), "ABCDEF0123456789");
    }

    #[test]
    fn missing_program_is_exec_error() {
        let keyring = GpgKeyring::with_program("definitely-not-a-gpg-binary");
        let err = keyring.unlock("nokey", "secret").unwrap_err();
        assert!(matches!(err, GpgError::Exec(_)));
    }

    #[test]
    fn unknown_key_does_not_unlock() {
        if !is_available() {
            return;
        }
        let keyring = GpgKeyring::new();
        let result = keyring.unlock("0000000000000000DEADBEEF00000000", "wrong");
        assert!(result.is_err());
    }
}
