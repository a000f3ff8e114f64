use tunnel_core::codec::{RawMessage, decode_utf8};
use tunnel_core::error::{SendMessageError, TunnelError};
use tunnel_core::operation::OperationState;
use tunnel_core::tunnel::ReplyBehavior;
use tunnel_core::{
    ForegroundTaskProvider, LoopbackTunnel, SendTunnelMessageOperation, TunnelStatus,
};

use common::ErrorLocation;

use std::error::Error;
use std::panic::Location;
use std::sync::Arc;

async fn failure_for(tunnel: LoopbackTunnel) -> SendMessageError {
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel),
        Arc::new(ForegroundTaskProvider),
        RawMessage::new("ping", b"ping".to_vec()),
        decode_utf8,
    )
    .start();

    match handle.result().await {
        Err(e) => e,
        Ok(reply) => panic!("expected failure, got reply {reply:?}"),
    }
}

/// **VALUE**: Failures reported by a running operation point at the code
/// that raised them.
///
/// **BUG THIS CATCHES**: Would catch if the error constructors lose
/// `#[track_caller]` and every failure reports the constructor itself.
#[tokio::test(start_paused = true)]
async fn given_tunnel_down_failure_when_formatted_then_includes_status_and_location() {
    // GIVEN
    let err = failure_for(LoopbackTunnel::new(TunnelStatus::Disconnecting)).await;

    // WHEN
    let error_string = err.to_string();

    // THEN
    assert!(error_string.contains("Tunnel Down Error"));
    assert!(error_string.contains("Tunnel is either down or about to go down"));
    assert!(error_string.contains("(status: disconnecting)"));
    assert!(error_string.contains("send_message.rs"));
    assert!(!error_string.contains("error/send_message.rs"));
    assert_eq!(err.kind(), "tunnel_down");
}

#[tokio::test(start_paused = true)]
async fn given_timeout_failure_when_formatted_then_reads_send_timeout() {
    // GIVEN
    let err = failure_for(
        LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply),
    )
    .await;

    // WHEN
    let error_string = err.to_string();

    // THEN
    assert!(error_string.contains("Timeout Error: Send timeout."));
    assert_eq!(err.kind(), "timeout");
}

/// **VALUE**: System errors keep the tunnel's own error as their source.
///
/// **WHY THIS MATTERS**: Callers walking the error chain need the transport
/// reason, not just "System error".
#[tokio::test(start_paused = true)]
async fn given_system_failure_when_source_inspected_then_tunnel_error_is_preserved() {
    // GIVEN
    let err = failure_for(
        LoopbackTunnel::new(TunnelStatus::Connected)
            .with_reply(ReplyBehavior::Reject("provider not running".to_string())),
    )
    .await;

    // WHEN
    let source = err.source().map(ToString::to_string);

    // THEN
    assert!(err.to_string().contains("System error: "));
    assert!(err.to_string().contains("provider not running"));
    let source = source.expect("system error should carry a source");
    assert!(source.contains("Submit Error: provider not running"));
}

#[test]
#[track_caller]
fn given_not_enough_background_time_error_when_formatted_then_describes_budget() {
    // GIVEN
    let err = SendMessageError::NotEnoughBackgroundTime {
        remaining: std::time::Duration::from_secs(3),
        timeout: std::time::Duration::from_secs(5),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let error_string = format!("{}", err);

    // THEN
    assert!(error_string.contains("Not enough background time to accommodate the operation"));
    assert!(error_string.contains("remaining 3s"));
    assert!(error_string.contains("timeout 5s"));
    assert!(error_string.contains("send_message.rs"));
}

#[test]
#[track_caller]
fn given_not_connected_tunnel_error_when_formatted_then_includes_location() {
    // GIVEN
    let err = TunnelError::NotConnected {
        message: "Tunnel configuration is invalid".to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    // WHEN
    let error_string = format!("{}", err);

    // THEN
    assert!(error_string.starts_with("Not Connected Error: Tunnel configuration is invalid ["));
    assert!(error_string.ends_with("]"));
}

#[test]
fn given_cancelled_state_then_it_is_terminal_and_named_cancelled() {
    assert_eq!(OperationState::Cancelled.to_string(), "cancelled");
    assert!(OperationState::Cancelled.is_terminal());
    assert!(!OperationState::WaitingForConnecting.is_terminal());
}
