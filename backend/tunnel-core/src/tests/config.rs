// Unit tests for config validation and duration formatting.
// File round-trips through load/save live in integration_tests/config.

use crate::config::{IpcConfig, OperationConfig};
use crate::error::config::ConfigError;
use crate::{CONNECTING_STATE_WAIT_DELAY, DEFAULT_TIMEOUT};

use std::time::Duration;

#[test]
fn given_default_config_when_validated_then_ok_and_matches_constants() {
    let config = IpcConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.operation.timeout, DEFAULT_TIMEOUT);
    assert_eq!(
        config.operation.connecting_state_wait_delay,
        CONNECTING_STATE_WAIT_DELAY
    );
}

/// **VALUE**: Durations are written in human-readable form.
///
/// **WHY THIS MATTERS**: The config file is edited by hand; `"5s"` is readable,
/// `{"secs":5,"nanos":0}` is not.
#[test]
fn given_operation_config_when_serialized_then_uses_humantime_strings() {
    let config = OperationConfig {
        timeout: Duration::from_secs(90),
        connecting_state_wait_delay: Duration::from_millis(2_500),
    };

    let json = serde_json::to_string(&config).unwrap();

    assert_eq!(
        json,
        r#"{"timeout":"1m 30s","connecting_state_wait_delay":"2s 500ms"}"#
    );
}

#[test]
fn given_partial_json_when_deserialized_then_missing_fields_use_defaults() {
    let config: IpcConfig = serde_json::from_str(r#"{"operation":{"timeout":"12s"}}"#).unwrap();

    assert_eq!(config.version, 1);
    assert_eq!(config.operation.timeout, Duration::from_secs(12));
    assert_eq!(
        config.operation.connecting_state_wait_delay,
        CONNECTING_STATE_WAIT_DELAY
    );
}

#[test]
fn given_unparseable_duration_when_deserialized_then_fails() {
    let result: Result<IpcConfig, _> =
        serde_json::from_str(r#"{"operation":{"timeout":"soon"}}"#);

    assert!(result.is_err());
}

/// **BUG THIS CATCHES**: A zero timeout would make every operation fail
/// instantly with `Timeout` and also trips the background budget check.
#[test]
fn given_zero_timeout_when_validated_then_returns_validation_error() {
    let mut config = IpcConfig::default();
    config.operation.timeout = Duration::ZERO;

    let err = config.validate().unwrap_err();

    assert!(matches!(err, ConfigError::Validation { .. }));
    assert!(err.to_string().contains("Invalid timeout"));
}

#[test]
fn given_out_of_range_values_when_validated_then_returns_validation_error() {
    let mut too_long = IpcConfig::default();
    too_long.operation.timeout = Duration::from_secs(3_600);
    assert!(matches!(
        too_long.validate(),
        Err(ConfigError::Validation { .. })
    ));

    let mut long_wait = IpcConfig::default();
    long_wait.operation.connecting_state_wait_delay = Duration::from_secs(120);
    assert!(matches!(
        long_wait.validate(),
        Err(ConfigError::Validation { .. })
    ));

    let mut future_version = IpcConfig::default();
    future_version.version = 2;
    assert!(matches!(
        future_version.validate(),
        Err(ConfigError::Validation { .. })
    ));
}
