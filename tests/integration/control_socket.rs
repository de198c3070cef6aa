// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Integration Tests: Control Socket
//!
//! Runs the logd binary with a startup config and drives it over its control
//! socket, both through the library client and the logctl binary.

use crate::tests::{cleanup_socket, unique_socket_path_with_prefix};
use anyhow::Result;
use dispatch_log::control::send_command;
use dispatch_log::{Level, ManagementCommand, Response, SourceUpdate};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;

/// Kills the daemon and removes its socket when dropped
struct Daemon {
    child: Child,
    socket_path: PathBuf,
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        cleanup_socket(&self.socket_path);
    }
}

/// Spawns logd with a unique socket path and waits for the socket
async fn spawn_logd(prefix: &str, config: &Path) -> Result<Daemon> {
    let socket_path = unique_socket_path_with_prefix(prefix);
    cleanup_socket(&socket_path);

    let child = Command::new(env!("CARGO_BIN_EXE_logd"))
        .arg("--config")
        .arg(config)
        .arg("--control-socket-path")
        .arg(&socket_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let daemon = Daemon { child, socket_path };

    let mut wait_count = 0;
    while !daemon.socket_path.exists() {
        if wait_count > 50 {
            return Err(anyhow::anyhow!("Socket creation timeout"));
        }
        sleep(Duration::from_millis(100)).await;
        wait_count += 1;
    }
    Ok(daemon)
}

fn write_config(dir: &Path, log_file: &Path) -> PathBuf {
    let config_path = dir.join("logd.json5");
    let config = format!(
        r#"{{
            // Keep the daemon quiet on stderr
            history_capacity: 100,
            log: [
                {{ module: "DEFAULT", output: "{}", timestamp: false }},
                {{ module: "ROUTER", enable: "debug+", source: true }},
            ],
        }}"#,
        log_file.display()
    );
    std::fs::write(&config_path, config).unwrap();
    config_path
}

#[tokio::test]
async fn test_daemon_applies_config_and_answers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_file = dir.path().join("logd.log");
    let daemon = spawn_logd("logd_config", &write_config(dir.path(), &log_file)).await?;

    let response = send_command(&daemon.socket_path, &ManagementCommand::Ping).await?;
    assert_eq!(response, Response::Success("pong".to_string()));

    let response = send_command(
        &daemon.socket_path,
        &ManagementCommand::GetSource {
            module: "router".to_string(),
        },
    )
    .await?;
    match response {
        Response::Source(settings) => {
            assert_eq!(settings.module, "ROUTER");
            assert_eq!(settings.mask, Some(Level::Debug.at_or_above()));
            assert_eq!(settings.source_display, Some(true));
        }
        other => panic!("Expected Response::Source, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_log_update_and_recent_over_socket() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_file = dir.path().join("logd.log");
    let daemon = spawn_logd("logd_recent", &write_config(dir.path(), &log_file)).await?;
    let socket = daemon.socket_path.clone();

    let log = |level: Level, text: &str| ManagementCommand::Log {
        module: "OPS".to_string(),
        level,
        text: text.to_string(),
    };
    send_command(&socket, &log(Level::Info, "first")).await?;
    send_command(&socket, &log(Level::Debug, "hidden")).await?;

    let response = send_command(
        &socket,
        &ManagementCommand::UpdateSource(SourceUpdate::new("OPS").enable("trace+")),
    )
    .await?;
    assert!(matches!(response, Response::Success(_)));
    send_command(&socket, &log(Level::Debug, "visible")).await?;

    match send_command(&socket, &ManagementCommand::RecentEntries { limit: 0 }).await? {
        Response::Entries(entries) => {
            let ops: Vec<&str> = entries
                .iter()
                .filter(|e| e.module == "OPS")
                .map(|e| e.text.as_str())
                .collect();
            assert_eq!(ops, vec!["first", "visible"]);
        }
        other => panic!("Expected Response::Entries, got {:?}", other),
    }

    match send_command(
        &socket,
        &ManagementCommand::SourceStats {
            module: "OPS".to_string(),
        },
    )
    .await?
    {
        Response::Stats(stats) => {
            assert_eq!(stats.info_count, 1);
            assert_eq!(stats.debug_count, 2);
        }
        other => panic!("Expected Response::Stats, got {:?}", other),
    }

    let content = std::fs::read_to_string(&log_file)?;
    assert!(content.contains("OPS (info) first\n"));
    assert!(content.contains("OPS (debug) visible\n"));
    assert!(!content.contains("hidden"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_update_reports_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_file = dir.path().join("logd.log");
    let daemon = spawn_logd("logd_invalid", &write_config(dir.path(), &log_file)).await?;

    let response = send_command(
        &daemon.socket_path,
        &ManagementCommand::UpdateSource(SourceUpdate::new("OPS").enable("bogus+")),
    )
    .await?;
    match response {
        Response::Error(msg) => assert!(msg.contains("'bogus+' is not a valid log level")),
        other => panic!("Expected Response::Error, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_logctl_ping() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let log_file = dir.path().join("logd.log");
    let daemon = spawn_logd("logctl_ping", &write_config(dir.path(), &log_file)).await?;

    let output = Command::new(env!("CARGO_BIN_EXE_logctl"))
        .arg("--socket-path")
        .arg(&daemon.socket_path)
        .arg("ping")
        .output()?;
    assert!(output.status.success());
    let response: Response = serde_json::from_slice(&output.stdout)?;
    assert_eq!(response, Response::Success("pong".to_string()));

    let output = Command::new(env!("CARGO_BIN_EXE_logctl"))
        .arg("--socket-path")
        .arg(&daemon.socket_path)
        .arg("update")
        .arg("OPS")
        .arg("--enable")
        .arg("nonsense")
        .output()?;
    assert!(!output.status.success());
    Ok(())
}

#[test]
fn test_logd_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bad.json5");
    std::fs::write(&config_path, r#"{ log: [ { module: "A", enable: "loud" } ] }"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_logd"))
        .arg("--config")
        .arg(&config_path)
        .arg("--control-socket-path")
        .arg(unique_socket_path_with_prefix("logd_bad_config"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid enable 'loud'"));
}
