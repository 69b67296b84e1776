//! End-to-end tests for the `wl` binary.
//!
//! Every test runs with a scratch HOME and a cleared environment so no real
//! configuration or credentials leak in.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

fn wl_binary() -> String {
    env!("CARGO_BIN_EXE_wl").to_string()
}

/// Writes a config file pointing the link file into `home`.
fn write_config(home: &Path) -> PathBuf {
    let config_path = home.join("wl.toml");
    let mapping_path = home.join("links/projects.json");
    std::fs::write(
        &config_path,
        format!("mapping_path = {:?}\n", mapping_path.display().to_string()),
    )
    .unwrap();
    config_path
}

fn wl(home: &Path) -> Command {
    let mut command = Command::new(wl_binary());
    command.env_clear().env("HOME", home);
    command
}

fn run_ok(command: &mut Command) -> String {
    let output = command.output().expect("failed to run wl");
    assert!(
        output.status.success(),
        "wl should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn run_with_stdin(command: &mut Command, input: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn wl");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_link_status_unlink_flow() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let linked = run_ok(
        wl(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["link", "--workspace", "file:///work/api/", "--project", "proj-api"]),
    );
    assert_eq!(linked, "Linked file:///work/api to proj-api\n");
    assert!(temp.path().join("links/projects.json").exists());

    let status = run_ok(wl(temp.path()).arg("--config").arg(&config).arg("status"));
    assert!(status.contains("Organization: (not set)"));
    assert!(status.contains("- file:///work/api -> proj-api"));

    let unlinked = run_ok(
        wl(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["unlink", "--workspace", "file:///work/api"]),
    );
    assert_eq!(unlinked, "Unlinked file:///work/api from proj-api\n");

    let status = run_ok(wl(temp.path()).arg("--config").arg(&config).arg("status"));
    assert!(status.contains("No linked workspaces."));
}

#[test]
fn test_run_without_credentials_tracks_locally() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    run_ok(
        wl(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["link", "--workspace", "file:///work/api", "--project", "proj-api"]),
    );

    let input = concat!(
        "{\"type\":\"initial\",\"ms\":120000}\n",
        "{\"type\":\"activity\"}\n",
        "garbage\n",
        "{\"type\":\"sync\"}\n",
        "{\"type\":\"stop\"}\n",
    );
    let output = run_with_stdin(
        wl(temp.path())
            .arg("--verbose")
            .arg("--config")
            .arg(&config)
            .args(["run", "--workspace", "file:///work/api"]),
        input,
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "wl run should succeed: {stderr}");
    assert!(stderr.contains("remote sync disabled"), "stderr: {stderr}");
    assert!(stderr.contains("ignoring malformed host event"), "stderr: {stderr}");

    let stdout = String::from_utf8(output.stdout).unwrap();
    let statuses: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert!(statuses.len() >= 2, "stdout: {stdout}");
    assert!(statuses.iter().all(|s| s["type"] == "status"));

    let last = statuses.last().unwrap();
    assert_eq!(last["project"], "proj-api");
    assert_eq!(last["active"], false);
    assert!(last["total_ms"].as_i64().unwrap() >= 120_000);
    assert_eq!(last["text"], "2m");
}

#[test]
fn test_run_exits_when_stdin_closes() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = run_with_stdin(
        wl(temp.path())
            .arg("--config")
            .arg(&config)
            .args(["run", "--workspace", "file:///scratch", "--unfocused"]),
        "{\"type\":\"focus\",\"focused\":true}\n",
    );
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["project"], serde_json::Value::Null);
    assert_eq!(last["active"], false);
}

#[test]
fn test_run_rejects_invalid_policy() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = run_with_stdin(
        wl(temp.path())
            .env("WL_POLICY__IDLE_POLL_MS", "0")
            .arg("--config")
            .arg(&config)
            .args(["run", "--workspace", "file:///work/api"]),
        "",
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("idle_poll_ms must be positive"), "stderr: {stderr}");
}

#[test]
fn test_today_requires_credentials() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());

    let output = wl(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("today")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("organization_id is not set"), "stderr: {stderr}");
}
