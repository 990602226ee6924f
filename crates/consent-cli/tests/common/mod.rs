//! Shared E2E test helpers for `consent-filter` binary tests.

use assert_cmd::cargo::cargo_bin_cmd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for CLI tests.
pub const TIMEOUT_BASIC: Duration = Duration::from_secs(10);

/// Environment variables read by the config loader.
const CONSENT_ENV_VARS: &[&str] = &["CONSENT_ENABLED", "CONSENT_DEFAULT_PARTITION", "CONSENT_PAGE_SIZE"];

/// Two patients: PTA active, PTB inactive.
pub const TWO_PATIENTS: &str = r#"{
  "resourceType": "Bundle",
  "type": "searchset",
  "total": 2,
  "entry": [
    {"resource": {"resourceType": "Patient", "id": "PTA", "active": true}},
    {"resource": {"resourceType": "Patient", "id": "PTB", "active": false}}
  ]
}"#;

/// Build a Command for `consent-filter` isolated from the host.
///
/// HOME points at a fresh temp dir (no global config), the working
/// directory is that same dir (no project config), and `CONSENT_*` vars
/// are cleared. Returns (command, guard); keep the guard alive.
pub fn consent_cmd() -> (assert_cmd::Command, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create temp dir");
    let mut cmd: assert_cmd::Command = cargo_bin_cmd!("consent-filter");
    cmd.timeout(TIMEOUT_BASIC);
    cmd.env("HOME", tmp.path());
    cmd.env_remove("RUST_LOG");
    for var in CONSENT_ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.current_dir(tmp.path());
    (cmd, tmp)
}

/// Writes `content` to `dir/name` and returns the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Parses every stdout line as JSON.
pub fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).expect("stdout line is JSON"))
        .collect()
}

/// Entry ids of a bundle document.
pub fn entry_ids(doc: &serde_json::Value) -> Vec<String> {
    doc["entry"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e["resource"]["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
