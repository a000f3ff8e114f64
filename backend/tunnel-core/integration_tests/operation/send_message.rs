use crate::operation::helpers::{
    CompletionRecorder, PING, UnencodableMessage, advance, ping, settle, start_ping_in_foreground,
};

use tunnel_core::codec::{JsonMessage, decode_json, decode_utf8, require_response};
use tunnel_core::error::{DecodeError, SendMessageError, TunnelError};
use tunnel_core::operation::OperationState;
use tunnel_core::tunnel::ReplyBehavior;
use tunnel_core::{
    ForegroundTaskProvider, LoopbackTunnel, SendTunnelMessageOperation, TunnelStatus,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);
const TENTH: Duration = Duration::from_millis(100);

/// **VALUE**: The happy path delivers the decoded reply.
///
/// **WHY THIS MATTERS**: This is the only success path of the operation.
#[tokio::test(start_paused = true)]
async fn given_connected_tunnel_when_started_then_sends_once_and_returns_reply() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    let result = handle.result().await;

    // THEN
    assert_eq!(result.unwrap(), "ping");
    assert_eq!(tunnel.sent_messages(), vec![PING.to_vec()]);
    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.last_kind().as_deref(), Some("ok"));
}

/// **VALUE**: A connected tunnel is messaged without any grace wait.
///
/// **BUG THIS CATCHES**: Applying the connecting-state delay to every status.
#[tokio::test(start_paused = true)]
async fn given_connected_tunnel_when_started_then_send_happens_without_advancing_time() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // THEN
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.state(), OperationState::Sending);
}

#[tokio::test(start_paused = true)]
async fn given_reasserting_tunnel_when_started_then_sends_immediately() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Reasserting);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // THEN
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

/// **VALUE**: A connected tunnel that never answers times out after exactly
/// the configured timeout, not timeout plus grace delay.
#[tokio::test(start_paused = true)]
async fn given_connected_tunnel_without_reply_when_timeout_elapses_then_fails_with_timeout() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    advance(4 * SECOND + 9 * TENTH).await;
    let finished_early = handle.is_finished();
    advance(TENTH).await;

    // THEN
    assert!(!finished_early);
    assert!(handle.is_finished());
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Timeout { .. })
    ));
}

/// **VALUE**: A tunnel that just launched is given the full grace period
/// before it is messaged.
///
/// **WHY THIS MATTERS**: Messaging a tunnel too early during start-up can
/// freeze it.
///
/// **BUG THIS CATCHES**: Sending as soon as the operation starts.
#[tokio::test(start_paused = true)]
async fn given_tunnel_connecting_since_launch_when_grace_period_elapses_then_message_is_sent() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    advance(4 * SECOND + 9 * TENTH).await;
    let sent_early = tunnel.sent_messages().len();
    let state_while_waiting = handle.state();
    advance(TENTH).await;

    // THEN
    assert_eq!(sent_early, 0);
    assert_eq!(state_while_waiting, OperationState::WaitingForConnecting);
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

/// **VALUE**: The deadline is pushed back by the grace wait.
///
/// **BUG THIS CATCHES**: Keeping the initial deadline, which would time the
/// operation out at the very moment the deferred send happens.
#[tokio::test(start_paused = true)]
async fn given_tunnel_connecting_since_launch_and_no_reply_then_timeout_fires_at_ten_seconds() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO)
        .with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    advance(5 * SECOND).await;
    let sent_at_five = tunnel.sent_messages().len();
    let finished_at_five = handle.is_finished();
    advance(4 * SECOND + 9 * TENTH).await;
    let finished_before_ten = handle.is_finished();
    advance(TENTH).await;

    // THEN
    assert_eq!(sent_at_five, 1);
    assert!(!finished_at_five);
    assert!(!finished_before_ten);
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Timeout { .. })
    ));
    assert_eq!(recorder.calls(), 1);
}

/// **VALUE**: Only the remaining part of the grace period is waited.
#[tokio::test(start_paused = true)]
async fn given_tunnel_connecting_for_three_seconds_then_message_is_sent_two_seconds_later() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, 3 * SECOND);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    advance(SECOND + 8 * TENTH).await;
    let sent_early = tunnel.sent_messages().len();
    advance(2 * TENTH).await;

    // THEN
    assert_eq!(sent_early, 0);
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

#[tokio::test(start_paused = true)]
async fn given_tunnel_connecting_past_grace_period_when_started_then_sends_immediately() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, 6 * SECOND);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // THEN
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

/// **VALUE**: A tunnel with no known launch time is treated as just launched.
#[tokio::test(start_paused = true)]
async fn given_connecting_tunnel_without_start_date_when_started_then_waits_full_grace_period() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connecting).with_start_date(None);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    advance(4 * SECOND).await;

    // THEN
    assert!(tunnel.sent_messages().is_empty());
    assert_eq!(handle.state(), OperationState::WaitingForConnecting);
}

/// **VALUE**: Reaching `connected` during the grace wait sends right away.
#[tokio::test(start_paused = true)]
async fn given_grace_wait_in_progress_when_tunnel_becomes_connected_then_sends_without_waiting() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO)
        .with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(2 * SECOND).await;

    // WHEN
    tunnel.set_status(TunnelStatus::Connected);
    settle().await;

    // THEN
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.state(), OperationState::Sending);

    // The grace timer was cancelled: nothing else is sent when it would have fired.
    advance(3 * SECOND).await;
    assert_eq!(tunnel.sent_messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_grace_wait_in_progress_when_tunnel_disconnects_then_fails_with_tunnel_down() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(SECOND).await;

    // WHEN
    tunnel.set_status(TunnelStatus::Disconnected);
    settle().await;
    advance(20 * SECOND).await;

    // THEN
    assert!(tunnel.sent_messages().is_empty());
    assert_eq!(recorder.calls(), 1);
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::TunnelDown {
            status: TunnelStatus::Disconnected,
            ..
        })
    ));
}

/// **VALUE**: Down statuses fail fast and never reach the transport.
///
/// **BUG THIS CATCHES**: Timers left armed after a fast failure firing later
/// and reporting a second result.
#[tokio::test(start_paused = true)]
async fn given_down_tunnel_when_started_then_fails_with_tunnel_down_and_never_sends() {
    for status in [
        TunnelStatus::Invalid,
        TunnelStatus::Disconnected,
        TunnelStatus::Disconnecting,
    ] {
        // GIVEN
        let tunnel = LoopbackTunnel::new(status);
        let recorder = CompletionRecorder::default();

        // WHEN
        let handle = start_ping_in_foreground(&tunnel, &recorder);
        settle().await;
        advance(30 * SECOND).await;

        // THEN
        assert_eq!(handle.state(), OperationState::Failed);
        assert!(tunnel.sent_messages().is_empty());
        assert_eq!(tunnel.observer_count(), 0);
        assert_eq!(recorder.calls(), 1);
        match handle.result().await {
            Err(SendMessageError::TunnelDown { status: reported, .. }) => {
                assert_eq!(reported, status)
            }
            other => panic!("expected TunnelDown for {status}, got {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn given_status_observer_when_message_sent_then_observer_is_released() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // THEN
    assert_eq!(handle.state(), OperationState::Sending);
    assert_eq!(tunnel.observer_count(), 0);
}

/// **VALUE**: Once sent, status changes no longer affect the outcome.
#[tokio::test(start_paused = true)]
async fn given_message_sent_when_tunnel_disconnects_then_reply_still_wins() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(2 * SECOND);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;

    // WHEN
    tunnel.set_status(TunnelStatus::Disconnected);
    settle().await;

    // THEN
    assert_eq!(handle.result().await.unwrap(), "ping");
    assert_eq!(recorder.calls(), 1);
}

/// **VALUE**: Unknown raw statuses are ignored rather than treated as failures.
#[tokio::test(start_paused = true)]
async fn given_unknown_status_when_started_then_waits_for_a_known_status() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::from(42));
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(SECOND).await;
    assert_eq!(handle.state(), OperationState::Observing);
    assert!(tunnel.sent_messages().is_empty());

    // WHEN
    tunnel.set_status(TunnelStatus::Connected);
    settle().await;

    // THEN
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

#[tokio::test(start_paused = true)]
async fn given_unknown_status_only_when_timeout_elapses_then_fails_with_timeout() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Unknown(-1));
    let recorder = CompletionRecorder::default();

    // WHEN
    let result = start_ping_in_foreground(&tunnel, &recorder).result().await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Timeout { .. })));
    assert!(tunnel.sent_messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn given_rejected_submission_when_sent_then_fails_with_system_error() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected)
        .with_reply(ReplyBehavior::Reject("transport closed".to_string()));
    let recorder = CompletionRecorder::default();

    // WHEN
    let result = start_ping_in_foreground(&tunnel, &recorder).result().await;

    // THEN
    match result {
        Err(SendMessageError::System { source, .. }) => {
            assert!(matches!(source, TunnelError::Submit { .. }));
        }
        other => panic!("expected System error, got {other:?}"),
    }
    assert_eq!(recorder.last_kind().as_deref(), Some("system"));
}

#[tokio::test(start_paused = true)]
async fn given_unencodable_message_when_sent_then_fails_with_encoding_error_and_sends_nothing() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);

    // WHEN
    let result = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        Arc::new(ForegroundTaskProvider),
        UnencodableMessage,
        decode_utf8,
    )
    .start()
    .result()
    .await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Encoding { .. })));
    assert!(tunnel.sent_messages().is_empty());
}

/// **VALUE**: An absent reply surfaces as a decoding failure when the caller
/// requires a payload.
#[tokio::test(start_paused = true)]
async fn given_empty_reply_when_response_required_then_fails_with_empty_response() {
    // GIVEN
    let tunnel =
        LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::Respond(None));

    // WHEN
    let result = SendTunnelMessageOperation::new(
        Arc::new(tunnel),
        Arc::new(ForegroundTaskProvider),
        ping(),
        require_response,
    )
    .start()
    .result()
    .await;

    // THEN
    match result {
        Err(SendMessageError::Decoding { source, .. }) => {
            assert!(matches!(source, DecodeError::EmptyResponse { .. }));
        }
        other => panic!("expected Decoding error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn given_malformed_reply_when_decoded_then_fails_with_decoding_error() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected)
        .with_reply(ReplyBehavior::Respond(Some(vec![0xff, 0xfe])));
    let recorder = CompletionRecorder::default();

    // WHEN
    let result = start_ping_in_foreground(&tunnel, &recorder).result().await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Decoding { .. })));
    assert_eq!(recorder.last_kind().as_deref(), Some("decoding"));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct TunnelStats {
    bytes_sent: u64,
    bytes_received: u64,
}

#[tokio::test(start_paused = true)]
async fn given_json_message_when_echoed_then_reply_decodes_to_same_value() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
    let message = JsonMessage::new(
        "stats",
        TunnelStats {
            bytes_sent: 10,
            bytes_received: 20,
        },
    );

    // WHEN
    let result = SendTunnelMessageOperation::new(
        Arc::new(tunnel),
        Arc::new(ForegroundTaskProvider),
        message,
        decode_json::<TunnelStats>,
    )
    .start()
    .result()
    .await;

    // THEN
    assert_eq!(
        result.unwrap(),
        TunnelStats {
            bytes_sent: 10,
            bytes_received: 20,
        }
    );
}

/// **VALUE**: A per-call timeout overrides the default.
#[tokio::test(start_paused = true)]
async fn given_custom_timeout_when_no_reply_then_times_out_at_custom_deadline() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel),
        Arc::new(ForegroundTaskProvider),
        ping(),
        decode_utf8,
    )
    .with_timeout(Some(2 * SECOND))
    .start();
    settle().await;

    // WHEN
    advance(SECOND + 9 * TENTH).await;
    let finished_early = handle.is_finished();
    advance(TENTH).await;

    // THEN
    assert!(!finished_early);
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Timeout { .. })
    ));
}

/// **VALUE**: The completion handler fires exactly once even when many
/// events race after the result.
///
/// **BUG THIS CATCHES**: A late reply, status change or timer producing a
/// second result.
#[tokio::test(start_paused = true)]
async fn given_finished_operation_when_more_events_arrive_then_completion_is_not_repeated() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(SECOND);
    let recorder = CompletionRecorder::default();
    let handle = start_ping_in_foreground(&tunnel, &recorder);
    settle().await;
    advance(SECOND).await;
    assert_eq!(handle.state(), OperationState::Completed);

    // WHEN
    tunnel.set_status(TunnelStatus::Disconnected);
    handle.cancel();
    settle().await;
    advance(30 * SECOND).await;

    // THEN
    assert_eq!(recorder.calls(), 1);
    assert_eq!(handle.state(), OperationState::Completed);
    assert_eq!(handle.result().await.unwrap(), "ping");
}

/// **VALUE**: Dropping the handle does not abandon the operation.
#[tokio::test(start_paused = true)]
async fn given_dropped_handle_when_reply_arrives_then_completion_handler_still_runs() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(SECOND);
    let recorder = CompletionRecorder::default();

    // WHEN
    drop(start_ping_in_foreground(&tunnel, &recorder));
    settle().await;
    advance(SECOND).await;

    // THEN
    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.last_kind().as_deref(), Some("ok"));
}

/// **VALUE**: An unbounded timeout means "no deadline", not a crash.
///
/// **BUG THIS CATCHES**: Deadline arithmetic overflowing inside the operation
/// task. The task dies, the completion handler never runs and the handle
/// misreports the outcome as `Cancelled`.
#[tokio::test(start_paused = true)]
async fn given_unbounded_timeout_when_connected_then_reply_is_delivered_once() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        Arc::new(ForegroundTaskProvider),
        ping(),
        decode_utf8,
    )
    .with_timeout(Some(Duration::MAX))
    .on_completion(recorder.handler())
    .start();
    settle().await;

    // THEN
    assert_eq!(handle.result().await.unwrap(), "ping");
    assert_eq!(tunnel.sent_messages().len(), 1);
    assert_eq!(recorder.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn given_unbounded_timeout_during_grace_wait_when_cancelled_then_resolves_cancelled_once() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        Arc::new(ForegroundTaskProvider),
        ping(),
        decode_utf8,
    )
    .with_timeout(Some(Duration::MAX))
    .on_completion(recorder.handler())
    .start();
    settle().await;
    advance(SECOND).await;
    assert_eq!(handle.state(), OperationState::WaitingForConnecting);

    // WHEN
    handle.cancel();
    settle().await;

    // THEN
    assert_eq!(recorder.calls(), 1);
    assert_eq!(recorder.last_kind().as_deref(), Some("cancelled"));
    assert!(tunnel.sent_messages().is_empty());
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Cancelled { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn given_unbounded_connecting_wait_when_tunnel_connects_then_message_is_sent() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let recorder = CompletionRecorder::default();
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        Arc::new(ForegroundTaskProvider),
        ping(),
        decode_utf8,
    )
    .with_connecting_state_wait_delay(Duration::MAX)
    .on_completion(recorder.handler())
    .start();
    settle().await;
    advance(SECOND).await;
    assert_eq!(handle.state(), OperationState::WaitingForConnecting);

    // WHEN
    tunnel.set_status(TunnelStatus::Connected);
    settle().await;

    // THEN
    assert_eq!(handle.result().await.unwrap(), "ping");
    assert_eq!(recorder.calls(), 1);
}
