//! CLI integration tests
//!
//! Tests the sr-client binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn sr_client() -> Command {
    Command::cargo_bin("sr-client")
        .expect("Failed to locate sr-client binary - ensure it's built before running tests")
}

#[test]
fn test_cli_help() {
    sr_client()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("screen-relay client"))
        .stdout(predicate::str::contains("--interactive"));
}

#[test]
fn test_cli_version() {
    sr_client()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sr-client"));
}

#[test]
fn test_unreachable_relay_exits_with_failure() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("client.toml");
    std::fs::write(
        &config_path,
        "reconnect_attempts = 1\nreconnect_delay = 0\nconnect_timeout = 1000\n",
    )
    .unwrap();

    sr_client()
        .args(["--server", "127.0.0.1", "--port", &port.to_string()])
        .arg("--config")
        .arg(&config_path)
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not connect to relay"));
}
