//! Config discovery and parsing, observed through `vbump --json info`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("VBUMP_LOG_DIR", std::env::temp_dir().join("vbump-test-logs"));
    cmd
}

/// Run `info --json` from `dir` and parse the output.
fn info(dir: &Path) -> Value {
    let output = cmd()
        .args(["-C", dir.to_str().unwrap(), "--json", "info"])
        .assert()
        .success();
    serde_json::from_slice(&output.get_output().stdout).expect("info --json is JSON")
}

fn technology_ids(info: &Value) -> Vec<String> {
    info["technologies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let info = info(tmp.path());
    assert_eq!(technology_ids(&info), ["docker", "go", "javascript"]);
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.toml"), "[go]\n").unwrap();

    let info = info(tmp.path());
    assert_eq!(info["config"]["auto"], false);
    assert_eq!(technology_ids(&info), ["go"]);
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join("vbump.toml"), "[docker]\n").unwrap();

    let info = info(&sub_dir);
    assert_eq!(technology_ids(&info), ["docker"]);
    assert!(
        info["config"]["config_file"]
            .as_str()
            .unwrap()
            .ends_with("vbump.toml")
    );
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.toml"), "[go]\n").unwrap();
    fs::write(tmp.path().join("vbump.toml"), "[docker]\n").unwrap();

    assert_eq!(technology_ids(&info(tmp.path())), ["go"]);
}

#[test]
fn legacy_bump_file_is_read() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".bump"),
        "[javascript]\ndirectories = [\"web\"]\n",
    )
    .unwrap();

    let info = info(tmp.path());
    assert_eq!(technology_ids(&info), ["javascript"]);
    assert_eq!(info["technologies"][0]["directories"][0], "web");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".vbump.yaml"),
        "log_level: warn\ngeneric:\n  - name: helm\n    files: [Chart.yaml]\n",
    )
    .unwrap();

    let info = info(tmp.path());
    assert_eq!(info["config"]["log_level"], "warn");
    assert_eq!(technology_ids(&info), ["helm"]);
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".vbump.json"),
        r#"{"javascript": {"json_fields": ["version", "meta.version"]}, "git": {"sign": false}}"#,
    )
    .unwrap();

    let info = info(tmp.path());
    assert_eq!(info["config"]["sign"], false);
    assert_eq!(info["technologies"][0]["json_fields"][1], "meta.version");
}

#[test]
fn explicit_config_flag_overrides_discovery() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.toml"), "log_level = \"debug\"\n").unwrap();
    let extra = tmp.path().join("ci.toml");
    fs::write(&extra, "log_level = \"error\"\n").unwrap();

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "--config"])
        .arg(&extra)
        .arg("info")
        .assert()
        .success();
    let info: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(info["config"]["log_level"], "error");
}

#[test]
fn repeated_config_flags_layer_in_order() {
    let tmp = TempDir::new().unwrap();
    let base = tmp.path().join("base.toml");
    let ci = tmp.path().join("ci.yaml");
    fs::write(&base, "log_level = \"warn\"\n[git]\ncommit = false\n").unwrap();
    fs::write(&ci, "log_level: error\n").unwrap();

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--json"])
        .arg("--config")
        .arg(&base)
        .arg("-c")
        .arg(&ci)
        .arg("info")
        .assert()
        .success();
    let info: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(info["config"]["log_level"], "error");
    assert_eq!(info["config"]["commit"], false);
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.toml"), "this is not valid toml [[[").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.json"), "{not valid json}").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".vbump.toml"),
        "log_level = \"info\"\nunknown_field = \"ignored\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .success();
}

#[test]
fn bad_regex_fails_the_bump() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".vbump.toml"), "[go]\nregex = ['(unclosed']\n").unwrap();
    fs::write(tmp.path().join("main.go"), "const Version string = \"1.0.0\"\n").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "bump", "patch", "--no-commit"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid pattern"));
}

// =============================================================================
// Boundary Marker
// =============================================================================

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let parent = tmp.path().join("parent");
    let repo = parent.join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(parent.join(".vbump.toml"), "[go]\n").unwrap();
    fs::create_dir(repo.join(".git")).unwrap();

    let info = info(&src);
    assert_eq!(info["config"]["auto"], true);
}

#[test]
fn config_in_same_dir_as_git_is_found() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(repo.join(".vbump.toml"), "[go]\n").unwrap();

    assert_eq!(technology_ids(&info(&src)), ["go"]);
}
