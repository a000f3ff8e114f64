use crate::operation::helpers::{
    CompletionRecorder, advance, settle, start_ping_in_foreground,
};

use tunnel_core::error::SendMessageError;
use tunnel_core::operation::OperationState;
use tunnel_core::tunnel::ReplyBehavior;
use tunnel_core::{LoopbackTunnel, TunnelStatus};

use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);

/// **VALUE**: Cancelling during the grace wait resolves the operation and
/// stops the deferred send.
///
/// **BUG THIS CATCHES**: The grace timer firing after cancellation and
/// messaging the tunnel anyway.
#[tokio::test(start_paused = true)]
async fn given_grace_wait_in_progress_when_cancelled_then_resolves_cancelled_and_never_sends() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(2 * SECOND).await;

    // WHEN
    handle.cancel();
    settle().await;
    advance(20 * SECOND).await;

    // THEN
    assert_eq!(handle.state(), OperationState::Cancelled);
    assert!(tunnel.sent_messages().is_empty());
    assert_eq!(tunnel.observer_count(), 0);
    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.last_kind().as_deref(), Some("cancelled"));
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Cancelled { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn given_operation_observing_unknown_status_when_cancelled_then_resolves_cancelled() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Unknown(9));
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    handle.cancel();
    let result = handle.result().await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Cancelled { .. })));
    assert!(tunnel.sent_messages().is_empty());
}

/// **VALUE**: Cancellation after the message went out does not pre-empt the
/// reply.
///
/// **WHY THIS MATTERS**: The tunnel may already have acted on the message;
/// reporting `Cancelled` would hide its answer.
#[tokio::test(start_paused = true)]
async fn given_message_sent_when_cancelled_then_reply_is_still_delivered() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(3 * SECOND);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(SECOND).await;

    // WHEN
    handle.cancel();
    settle().await;
    let state_after_cancel = handle.state();

    // THEN
    assert_eq!(state_after_cancel, OperationState::Sending);
    assert_eq!(handle.result().await.unwrap(), "ping");
    assert_eq!(recorder.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_message_sent_without_reply_when_cancelled_then_timeout_still_applies() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    handle.cancel();
    let result = handle.result().await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Timeout { .. })));
    assert_eq!(recorder.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_finished_operation_when_cancelled_then_result_is_unchanged() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Disconnecting);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    assert_eq!(handle.state(), OperationState::Failed);

    // WHEN
    handle.cancel();
    settle().await;

    // THEN
    assert_eq!(handle.state(), OperationState::Failed);
    assert_eq!(recorder.calls(), 1);
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::TunnelDown { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn given_repeated_cancel_requests_then_completion_runs_once() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    handle.cancel();
    handle.cancel();
    handle.cancel();
    settle().await;

    // THEN
    assert_eq!(recorder.calls(), 1);
    assert_eq!(handle.state(), OperationState::Cancelled);
}
