//! Git storage for a finished bump.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! identity, GPG agent, hooks, and other configuration.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::gpg::SigningKey;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "config").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// Staging the modified files failed.
    #[error("error staging files: {stderr}")]
    Stage {
        /// Captured stderr.
        stderr: String,
    },

    /// Creating the release commit failed.
    #[error("error committing changes: {stderr}")]
    Commit {
        /// Captured stderr.
        stderr: String,
    },

    /// Creating the release tag failed.
    #[error("error tagging {tag}: {stderr}")]
    Tag {
        /// Tag name.
        tag: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// Where a finished bump is recorded.
pub trait Repository {
    /// The key to sign with, if the repository asks for signed commits.
    fn signing_key(&self) -> GitResult<Option<String>>;

    /// Stage `files`, commit them with `version` as the message and tag
    /// the commit `v{version}`, signing both when `key` is given.
    fn save(&self, files: &[Utf8PathBuf], version: &str, key: Option<&SigningKey>) -> GitResult<()>;
}

/// [`Repository`] backed by the `git` binary, rooted at a working tree.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: Utf8PathBuf,
}

impl SystemGit {
    /// Operate on the working tree at `root`.
    pub fn new(root: impl AsRef<Utf8Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Check if `root` is inside a git working tree.
    #[instrument(skip(self), fields(root = %self.root))]
    pub fn is_inside_repo(&self) -> GitResult<bool> {
        match self.git(&["rev-parse", "--is-inside-work-tree"]) {
            Ok(output) => Ok(output.trim() == "true"),
            Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Read a config value; `None` when unset.
    pub fn config_value(&self, key: &str) -> GitResult<Option<String>> {
        let output = Command::new("git")
            .args(["config", "--get", key])
            .current_dir(&self.root)
            .output()?;
        match output.status.code() {
            Some(0) => {
                let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok((!value.is_empty()).then_some(value))
            }
            // exit 1: key not set
            Some(1) => Ok(None),
            _ => Err(command_error("config", &output.stderr)),
        }
    }

    /// Run a git command in `root` and return its stdout.
    fn git(&self, args: &[&str]) -> GitResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            Err(command_error(args.first().unwrap_or(&""), &output.stderr))
        }
    }
}

impl Repository for SystemGit {
    #[instrument(skip(self), fields(root = %self.root))]
    fn signing_key(&self) -> GitResult<Option<String>> {
        let gpgsign = self.config_value("commit.gpgsign")?;
        if !gpgsign.is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            debug!("commit signing not enabled");
            return Ok(None);
        }
        let key = self.config_value("user.signingkey")?;
        debug!(?key, "signing key from git config");
        Ok(key)
    }

    #[instrument(skip(self, files, key), fields(root = %self.root, files = files.len()))]
    fn save(&self, files: &[Utf8PathBuf], version: &str, key: Option<&SigningKey>) -> GitResult<()> {
        let paths: Vec<&str> = files.iter().map(|p| p.as_str()).collect();

        let mut add = vec!["add", "--"];
        add.extend(&paths);
        self.git(&add).map_err(|e| GitError::Stage {
            stderr: stderr_of(e),
        })?;

        let gpg_sign;
        let mut commit = vec!["commit", "--message", version];
        match key {
            Some(k) => {
                gpg_sign = format!("--gpg-sign={}", k.key_id());
                commit.push(&gpg_sign);
            }
            None => commit.push("--no-gpg-sign"),
        }
        commit.push("--");
        commit.extend(&paths);
        self.git(&commit).map_err(|e| GitError::Commit {
            stderr: stderr_of(e),
        })?;

        let tag = format!("v{version}");
        let mut tag_args = vec!["tag", "--message", version];
        match key {
            Some(k) => tag_args.extend(["--sign", "--local-user", k.key_id()]),
            None => tag_args.push("--annotate"),
        }
        tag_args.push(&tag);
        self.git(&tag_args).map_err(|e| GitError::Tag {
            tag: tag.clone(),
            stderr: stderr_of(e),
        })?;

        info!(%tag, signed = key.is_some(), "committed and tagged");
        Ok(())
    }
}

fn command_error(command: &str, stderr: &[u8]) -> GitError {
    let stderr = String::from_utf8_lossy(stderr).trim().to_string();

    // Detect "not a git repo" specifically
    if stderr.contains("not a git repository") {
        return GitError::NotARepo;
    }

    GitError::Command {
        command: command.to_string(),
        stderr,
    }
}

fn stderr_of(error: GitError) -> String {
    match error {
        GitError::Command { stderr, .. } => stderr,
        other => other.to_string(),
    }
}

/// Check whether a `git` binary is on `PATH`.
pub fn is_available() -> bool {
    which::which("git").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo() -> Option<(TempDir, SystemGit)> {
        if !is_available() {
            return None;
        }
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        let repo = SystemGit::new(&root);
        repo.git(&["init", "--quiet"]).unwrap();
        repo.git(&["config", "user.name", "Test"]).unwrap();
        repo.git(&["config", "user.email", "test@example.com"]).unwrap();
        repo.git(&["config", "commit.gpgsign", "false"]).unwrap();
        repo.git(&["config", "tag.gpgsign", "false"]).unwrap();
        Some((tmp, repo))
    }

    #[test]
    fn outside_repo_is_not_a_repo() {
        if !is_available() {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        // a temp dir may still sit inside someone's checkout; only assert no error
        assert!(SystemGit::new(&root).is_inside_repo().is_ok());
    }

    #[test]
    fn signing_key_requires_gpgsign() {
        let Some((_tmp, repo)) = init_repo() else {
            return;
        };
        repo.git(&["config", "user.signingkey", "ABC123"]).unwrap();
        assert_eq!(repo.signing_key().unwrap(), None);

        repo.git(&["config", "commit.gpgsign", "true"]).unwrap();
        assert_eq!(repo.signing_key().unwrap().as_deref(), Some("ABC123"));
    }

    #[test]
    fn unset_config_is_none() {
        let Some((_tmp, repo)) = init_repo() else {
            return;
        };
        assert_eq!(repo.config_value("vbump.nothing").unwrap(), None);
    }

    #[test]
    fn save_commits_only_given_files_and_tags() {
        let Some((tmp, repo)) = init_repo() else {
            return;
        };
        let root = tmp.path();
        fs::write(root.join("package.json"), "{\"version\": \"1.0.1\"}\n").unwrap();
        fs::write(root.join("notes.txt"), "unrelated\n").unwrap();
        repo.git(&["add", "notes.txt"]).unwrap();

        repo.save(&[Utf8PathBuf::from("package.json")], "1.0.1", None)
            .unwrap();

        let subject = repo.git(&["log", "-1", "--format=%s"]).unwrap();
        assert_eq!(subject.trim(), "1.0.1");
        let tags = repo.git(&["tag", "--list"]).unwrap();
        assert_eq!(tags.trim(), "v1.0.1");
        let committed = repo
            .git(&["show", "--name-only", "--format=", "HEAD"])
            .unwrap();
        assert_eq!(committed.trim(), "package.json");
        let status = repo.git(&["status", "--porcelain"]).unwrap();
        assert_eq!(status.trim(), "A  notes.txt");
    }

    #[test]
    fn git_error_on_bad_command() {
        let Some((_tmp, repo)) = init_repo() else {
            return;
        };
        let result = repo.git(&["not-a-real-subcommand"]);
        assert!(matches!(result, Err(GitError::Command { .. })));
    }
}
