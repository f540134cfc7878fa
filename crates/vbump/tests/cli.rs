//! Runs the `vbump` binary against throwaway projects.

use std::fs;
use std::path::Path;
use std::process::Command as StdCommand;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary, logging into a temp dir.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("VBUMP_LOG_DIR", std::env::temp_dir().join("vbump-test-logs"));
    cmd
}

const DOCKERFILE: &str = "FROM alpine:3.20\nLABEL org.opencontainers.image.version=\"1.2.3\"\n";
const PACKAGE: &str = "{\n  \"name\": \"demo\",\n  \"version\": \"1.2.3\"\n}\n";

fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(tmp.path().join(name), content).unwrap();
    }
    tmp
}

fn dir_arg(tmp: &TempDir) -> &str {
    tmp.path().to_str().unwrap()
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("bump"));
}

#[test]
fn long_help_lists_log_variables() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("VBUMP_LOG_PATH"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn bump_help_lists_flags() {
    cmd()
        .args(["bump", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--alpha"))
        .stdout(predicate::str::contains("--no-commit"));
}

// =============================================================================
// Info Command
// =============================================================================

#[test]
fn info_json_outputs_valid_json() {
    let tmp = TempDir::new().unwrap();
    let output = cmd()
        .args(["-C", dir_arg(&tmp), "info", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("info --json should output valid JSON");

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["config"]["auto"], true);
    assert_eq!(json["technologies"].as_array().map(Vec::len), Some(3));
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn global_flags_accepted() {
    let cases: [&[&str]; 6] = [
        &["--quiet"],
        &["-q"],
        &["-v"],
        &["-vv"],
        &["--color", "never"],
        &["--color", "always"],
    ];
    for flags in cases {
        cmd().args(flags).arg("info").assert().success();
    }
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["-C", "/nonexistent/path/that/does/not/exist", "info"])
        .assert()
        .failure();
}

#[test]
fn no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Bump Command
// =============================================================================

#[test]
fn bump_without_target_is_usage_error() {
    let tmp = project(&[("package.json", PACKAGE)]);
    cmd()
        .args(["-C", dir_arg(&tmp), "bump"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn bump_dry_run_reports_without_writing() {
    let tmp = project(&[("package.json", PACKAGE), ("Dockerfile", DOCKERFILE)]);
    let output = cmd()
        .args(["-C", dir_arg(&tmp), "--json", "bump", "minor", "--dry-run"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["previous_version"], "1.2.3");
    assert_eq!(json["version"], "1.3.0");
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["modified_files"].as_array().map(Vec::len), Some(2));

    assert_eq!(fs::read_to_string(tmp.path().join("package.json")).unwrap(), PACKAGE);
}

#[test]
fn bump_no_commit_rewrites_files() {
    let tmp = project(&[("package.json", PACKAGE), ("Dockerfile", DOCKERFILE)]);
    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "patch", "--rc", "--no-commit", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.2.4-rc.0"));

    let package = fs::read_to_string(tmp.path().join("package.json")).unwrap();
    assert!(package.contains("\"version\": \"1.2.4-rc.0\""));
    let dockerfile = fs::read_to_string(tmp.path().join("Dockerfile")).unwrap();
    assert!(dockerfile.contains("version=\"1.2.4-rc.0\""));
}

#[test]
fn bump_inconsistent_versions_fails() {
    let tmp = project(&[
        ("package.json", PACKAGE),
        ("Dockerfile", "LABEL org.opencontainers.image.version=\"1.3.0\"\n"),
    ]);
    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "patch", "--no-commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("inconsistent versioning 1.2.3,1.3.0"));

    assert_eq!(fs::read_to_string(tmp.path().join("package.json")).unwrap(), PACKAGE);
}

#[test]
fn bump_without_versions_fails() {
    let tmp = project(&[("README.md", "no versions here\n")]);
    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "patch", "--no-commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("0 files updated"));
}

#[test]
fn bump_illegal_transition_fails() {
    let tmp = project(&[("package.json", PACKAGE)]);
    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "--beta", "--no-commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("prerelease"));
}

// =============================================================================
// Git
// =============================================================================

fn git(dir: &Path, args: &[&str]) -> String {
    let output = StdCommand::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {args:?} failed");
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn git_available() -> bool {
    StdCommand::new("git").arg("--version").output().is_ok()
}

#[test]
fn bump_commits_and_tags_in_a_repository() {
    if !git_available() {
        return;
    }
    let tmp = project(&[("package.json", PACKAGE)]);
    let dir = tmp.path();
    git(dir, &["init", "--quiet"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["config", "tag.gpgsign", "false"]);
    git(dir, &["add", "package.json"]);
    git(dir, &["commit", "--quiet", "--message", "initial"]);

    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "major", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("v2.0.0"));

    assert_eq!(git(dir, &["log", "-1", "--format=%s"]).trim(), "2.0.0");
    assert_eq!(git(dir, &["tag", "--list"]).trim(), "v2.0.0");
}

#[test]
fn bump_with_commit_outside_repository_fails() {
    if !git_available() {
        return;
    }
    let tmp = project(&[("package.json", PACKAGE)]);
    // a temp dir inside someone's checkout would be a repository
    if git_inside(tmp.path()) {
        return;
    }
    cmd()
        .args(["-C", dir_arg(&tmp), "bump", "patch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--no-commit"));
    assert_eq!(fs::read_to_string(tmp.path().join("package.json")).unwrap(), PACKAGE);
}

fn git_inside(dir: &Path) -> bool {
    StdCommand::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .is_ok_and(|o| o.status.success())
}
