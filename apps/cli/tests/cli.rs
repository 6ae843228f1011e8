//! End-to-end tests for the `cistern` binary

use assert_cmd::Command;
use predicates::prelude::*;

fn cistern(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cistern").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CISTERN_CONFIG")
        .env("CISTERN_LOG", "warn")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn config_prints_defaults() {
    let dir = tempfile::tempdir().unwrap();
    cistern(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[pool]"))
        .stdout(predicate::str::contains("max_size = 10"))
        .stdout(predicate::str::contains("[simulation]"));
}

#[test]
fn config_layers_file_env_and_flags() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cistern.toml"),
        "[pool]\nname = \"orders\"\nmin_size = 2\nmax_size = 4\n",
    )
    .unwrap();

    cistern(&dir)
        .env("CISTERN_POOL__MAX_SIZE", "7")
        .args(["config", "--min-size", "3", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""name": "orders""#))
        .stdout(predicate::str::contains(r#""min_size": 3"#))
        .stdout(predicate::str::contains(r#""max_size": 7"#));
}

#[test]
fn explicit_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    cistern(&dir)
        .args(["--config", "missing.toml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn invalid_pool_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    cistern(&dir)
        .args(["config", "--min-size", "5", "--max-size", "2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_size"));
}

#[test]
fn simulate_reports_json() {
    let dir = tempfile::tempdir().unwrap();
    let output = cistern(&dir)
        .args([
            "simulate",
            "--clients",
            "4",
            "--rounds",
            "5",
            "--failure-rate",
            "0",
            "--work-ms",
            "0",
            "--max-size",
            "2",
            "--json",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["queries"]["completed"], 20);
    assert_eq!(report["stats"]["acquisitions"], 20);
    assert_eq!(report["stats"]["in_use"], 0);
    assert_eq!(report["stats"]["state"], "open");
    assert!(report["stats"]["created"].as_u64().unwrap() <= 2);
}

#[test]
fn simulate_prints_text_summary() {
    let dir = tempfile::tempdir().unwrap();
    cistern(&dir)
        .args(["simulate", "--clients", "2", "--rounds", "3", "--work-ms", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pool 'db' finished"))
        .stdout(predicate::str::contains("plan cache"));
}
