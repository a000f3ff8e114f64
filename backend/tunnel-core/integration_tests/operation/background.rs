use crate::operation::helpers::{CompletionRecorder, advance, settle, start_ping};

use tunnel_core::error::SendMessageError;
use tunnel_core::operation::OperationState;
use tunnel_core::tunnel::ReplyBehavior;
use tunnel_core::{BudgetedTaskProvider, LoopbackTunnel, TunnelStatus};

use std::sync::Arc;
use std::time::Duration;

const SECOND: Duration = Duration::from_secs(1);

/// **VALUE**: The operation refuses to send when the host would suspend it
/// before the reply could arrive.
///
/// **BUG THIS CATCHES**: Checking `<` instead of `<=`, which lets a budget
/// equal to the timeout through.
#[tokio::test(start_paused = true)]
async fn given_budget_not_exceeding_timeout_when_sending_then_fails_and_never_sends() {
    for budget in [SECOND, 5 * SECOND] {
        // GIVEN
        let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
        let background = Arc::new(BudgetedTaskProvider::new(budget));
        let recorder = CompletionRecorder::default();

        // WHEN
        let result = start_ping(&tunnel, background.clone(), &recorder)
            .result()
            .await;

        // THEN
        match result {
            Err(SendMessageError::NotEnoughBackgroundTime {
                remaining, timeout, ..
            }) => {
                assert_eq!(remaining, budget);
                assert_eq!(timeout, 5 * SECOND);
            }
            other => panic!("expected NotEnoughBackgroundTime for {budget:?}, got {other:?}"),
        }
        assert!(tunnel.sent_messages().is_empty());
        assert!(background.active_tasks().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn given_budget_exceeding_timeout_when_sending_then_succeeds() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
    let background = Arc::new(BudgetedTaskProvider::new(5 * SECOND + Duration::from_millis(1)));
    let recorder = CompletionRecorder::default();

    // WHEN
    let result = start_ping(&tunnel, background, &recorder).result().await;

    // THEN
    assert_eq!(result.unwrap(), "ping");
}

/// **VALUE**: The budget is read when the message is sent, not when the
/// operation starts.
#[tokio::test(start_paused = true)]
async fn given_budget_shrinks_during_grace_wait_when_sending_then_fails_with_not_enough_time() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let background = Arc::new(BudgetedTaskProvider::new(60 * SECOND));
    let recorder = CompletionRecorder::default();
    let handle = start_ping(&tunnel, background.clone(), &recorder);
    settle().await;

    // WHEN
    background.set_time_remaining(3 * SECOND);
    advance(5 * SECOND).await;

    // THEN
    assert!(tunnel.sent_messages().is_empty());
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::NotEnoughBackgroundTime { .. })
    ));
}

/// **VALUE**: A named background task covers the operation while it runs.
#[tokio::test(start_paused = true)]
async fn given_running_operation_then_background_task_is_held_until_finish() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(SECOND);
    let background = Arc::new(BudgetedTaskProvider::new(60 * SECOND));
    let recorder = CompletionRecorder::default();

    // WHEN
    let handle = start_ping(&tunnel, background.clone(), &recorder);
    settle().await;
    let active_while_running = background.active_tasks();
    advance(SECOND).await;

    // THEN
    assert_eq!(
        active_while_running,
        vec!["Send tunnel provider message: ping".to_string()]
    );
    assert_eq!(handle.state(), OperationState::Completed);
    assert!(background.active_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn given_background_task_expires_during_grace_wait_then_operation_is_cancelled() {
    // GIVEN
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::ZERO);
    let background = Arc::new(BudgetedTaskProvider::new(60 * SECOND));
    let recorder = CompletionRecorder::default();
    let handle = start_ping(&tunnel, background.clone(), &recorder);
    settle().await;

    // WHEN
    background.expire_all();
    settle().await;
    advance(10 * SECOND).await;

    // THEN
    assert!(tunnel.sent_messages().is_empty());
    assert_eq!(recorder.calls(), 1);
    assert!(matches!(
        handle.result().await,
        Err(SendMessageError::Cancelled { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn given_background_task_expires_after_send_then_reply_still_wins() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply_delay(2 * SECOND);
    let background = Arc::new(BudgetedTaskProvider::new(60 * SECOND));
    let recorder = CompletionRecorder::default();
    let handle = start_ping(&tunnel, background.clone(), &recorder);
    settle().await;

    // WHEN
    background.expire_all();
    settle().await;

    // THEN
    assert_eq!(handle.result().await.unwrap(), "ping");
    assert!(background.active_tasks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn given_no_reply_when_operation_times_out_then_background_task_is_ended() {
    // GIVEN
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected).with_reply(ReplyBehavior::NoReply);
    let background = Arc::new(BudgetedTaskProvider::new(60 * SECOND));
    let recorder = CompletionRecorder::default();

    // WHEN
    let result = start_ping(&tunnel, background.clone(), &recorder)
        .result()
        .await;

    // THEN
    assert!(matches!(result, Err(SendMessageError::Timeout { .. })));
    assert!(background.active_tasks().is_empty());
}
