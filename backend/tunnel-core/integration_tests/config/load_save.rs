use tunnel_core::codec::{RawMessage, decode_utf8};
use tunnel_core::error::{ConfigError, SendMessageError};
use tunnel_core::tunnel::ReplyBehavior;
use tunnel_core::{
    ForegroundTaskProvider, IpcConfig, LoopbackTunnel, OperationConfig,
    SendTunnelMessageOperation, TunnelStatus,
};

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

const CONFIG_FILE_NAME: &str = "tunnel-ipc.json";

/// **VALUE**: A fresh install works without a config file.
#[test]
fn given_missing_config_file_when_loaded_then_returns_defaults() {
    // GIVEN
    let dir = TempDir::new().unwrap();

    // WHEN
    let config = IpcConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config, IpcConfig::default());
}

#[test]
fn given_saved_config_when_loaded_then_values_survive() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let config = IpcConfig {
        operation: OperationConfig {
            timeout: Duration::from_secs(30),
            connecting_state_wait_delay: Duration::from_secs(8),
        },
        ..IpcConfig::default()
    };

    // WHEN
    config.save(dir.path()).unwrap();
    let loaded = IpcConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(loaded, config);
}

/// **VALUE**: Saving leaves no temp file behind.
///
/// **BUG THIS CATCHES**: Writing the temp file but skipping the rename, which
/// would leave the real config untouched.
#[test]
fn given_config_when_saved_then_written_atomically_without_leftover_temp_file() {
    // GIVEN
    let dir = TempDir::new().unwrap();

    // WHEN
    IpcConfig::default().save(dir.path()).unwrap();

    // THEN
    assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    assert!(!dir.path().join(format!("{CONFIG_FILE_NAME}.tmp")).exists());
}

#[test]
fn given_missing_config_dir_when_saved_then_directory_is_created() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested").join("config");

    // WHEN
    IpcConfig::default().save(&nested).unwrap();

    // THEN
    assert!(nested.join(CONFIG_FILE_NAME).exists());
}

/// **VALUE**: Hand-written files use human-readable durations and may omit
/// fields.
#[test]
fn given_hand_written_partial_config_when_loaded_then_missing_fields_use_defaults() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "operation": { "timeout": "1m 30s" } }"#,
    )
    .unwrap();

    // WHEN
    let config = IpcConfig::load(dir.path()).unwrap();

    // THEN
    assert_eq!(config.version, 1);
    assert_eq!(config.operation.timeout, Duration::from_secs(90));
    assert_eq!(
        config.operation.connecting_state_wait_delay,
        Duration::from_secs(5)
    );
}

#[test]
fn given_corrupt_config_file_when_loaded_then_returns_parse_error() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

    // WHEN
    let result = IpcConfig::load(dir.path());

    // THEN
    match result {
        Err(ConfigError::Parse { path, .. }) => {
            assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
        }
        other => panic!("expected Parse error, got {other:?}"),
    }
}

#[test]
fn given_unparseable_duration_when_loaded_then_returns_parse_error() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "operation": { "timeout": "soon" } }"#,
    )
    .unwrap();

    // WHEN
    let result = IpcConfig::load(dir.path());

    // THEN
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn given_out_of_range_timeout_on_disk_when_loaded_then_returns_validation_error() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "version": 1, "operation": { "timeout": "1h" } }"#,
    )
    .unwrap();

    // WHEN
    let result = IpcConfig::load(dir.path());

    // THEN
    assert!(matches!(result, Err(ConfigError::Validation { .. })));
}

#[test]
fn given_invalid_config_when_saved_then_nothing_is_written() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    let config = IpcConfig {
        operation: OperationConfig {
            timeout: Duration::ZERO,
            ..OperationConfig::default()
        },
        ..IpcConfig::default()
    };

    // WHEN
    let result = config.save(dir.path());

    // THEN
    assert!(matches!(result, Err(ConfigError::Validation { .. })));
    assert!(!dir.path().join(CONFIG_FILE_NAME).exists());
}

/// **VALUE**: Loaded settings drive the operation's timers.
#[tokio::test(start_paused = true)]
async fn given_loaded_config_when_operation_runs_then_configured_timeout_applies() {
    // GIVEN
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "operation": { "timeout": "2s", "connecting_state_wait_delay": "1s" } }"#,
    )
    .unwrap();
    let config = IpcConfig::load(dir.path()).unwrap();
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO)
        .with_reply(ReplyBehavior::NoReply);

    // WHEN
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        Arc::new(ForegroundTaskProvider),
        RawMessage::new("ping", b"ping".to_vec()),
        decode_utf8,
    )
    .with_config(&config.operation)
    .start();
    let started = tokio::time::Instant::now();
    let result = handle.result().await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Timeout { .. })));
    assert_eq!(tunnel.sent_messages().len(), 1);
    // One second of grace wait on top of the two second timeout.
    assert!(started.elapsed() <= Duration::from_secs(3));
    assert!(started.elapsed() > Duration::from_secs(2));
}
