/// Tests for the rmad binary in test mode
///
/// Every invocation is a separate process, so these also cover resuming the
/// session from the state file between commands.
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

use rmad::RmadConfig;

struct CliEnv {
    dir: TempDir,
    config_path: PathBuf,
}

impl CliEnv {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let rma_dir = dir.path().join("rma-data");
        let config = RmadConfig {
            store_path: rma_dir.join("state"),
            working_dir: dir.path().join("work"),
            unencrypted_rma_dir: rma_dir,
            log_output_dir: dir.path().join("logs"),
            test_mode: true,
            log_level: "warn".to_string(),
            ..Default::default()
        };
        let config_path = dir.path().join("rmad.toml");
        config.save_to_file(&config_path).unwrap();
        Self { dir, config_path }
    }

    fn rmad(&self) -> Command {
        let mut cmd = Command::cargo_bin("rmad").unwrap();
        cmd.arg("--config").arg(&self.config_path);
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.rmad().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }
}

#[test]
fn test_state_survives_between_invocations() {
    let env = CliEnv::new();

    let reply = env.json(&["state"]);
    assert_eq!(reply["error"], "OK");
    assert_eq!(reply["state"]["state"], "welcome");
    assert!(env.dir.path().join("rma-data").join("state").exists());

    let reply = env.json(&[
        "next",
        "--payload",
        r#"{"state":"welcome","payload":{"choice":"finalize_repair"}}"#,
    ]);
    assert_eq!(reply["state"]["state"], "components_repair");

    let reply = env.json(&["state"]);
    assert_eq!(reply["state"]["state"], "components_repair");
    assert_eq!(reply["can_go_back"], true);

    let reply = env.json(&["previous"]);
    assert_eq!(reply["state"]["state"], "welcome");
}

#[test]
fn test_abort_then_not_required() {
    let env = CliEnv::new();
    env.json(&["state"]);

    let reply = env.json(&["abort"]);
    assert_eq!(reply["error"], "RMA_NOT_REQUIRED");
    assert!(!env.dir.path().join("rma-data").join("state").exists());
    assert!(env.dir.path().join("rma-data").join("metrics").join("rma_metrics.jsonl").exists());
}

#[test]
fn test_bad_payload_is_rejected() {
    let env = CliEnv::new();
    env.rmad()
        .args(["next", "--payload", "not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Payload is not a valid tagged state"));
}

#[test]
fn test_log_prints_journal_text() {
    let env = CliEnv::new();
    env.json(&[
        "next",
        "--payload",
        r#"{"state":"welcome","payload":{"choice":"finalize_repair"}}"#,
    ]);
    env.rmad().arg("log").assert().success().stdout(predicate::str::is_empty().not());
}

#[test]
fn test_serve_answers_each_line() {
    let env = CliEnv::new();
    let output = env
        .rmad()
        .arg("serve")
        .write_stdin("{\"method\":\"get_current_state\"}\nnonsense\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["state"]["state"], "welcome");
    assert_eq!(lines[1]["error"], "REQUEST_INVALID");
}
