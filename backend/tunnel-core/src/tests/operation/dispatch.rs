// Unit tests for the status-driven dispatch policy.
// End-to-end behaviour of the same table is covered in integration_tests/operation.

use crate::CONNECTING_STATE_WAIT_DELAY;
use crate::operation::dispatch::{StatusAction, evaluate};
use crate::tunnel::TunnelStatus;

use std::time::Duration;

fn evaluate_fresh(status: TunnelStatus, time_since_launch: Duration) -> StatusAction {
    evaluate(
        status,
        false,
        false,
        time_since_launch,
        CONNECTING_STATE_WAIT_DELAY,
    )
}

/// **VALUE**: Connected and reasserting tunnels accept IPC right away.
///
/// **BUG THIS CATCHES**: Would catch if reasserting were lumped in with the down
/// statuses, failing messages during a routine network change.
#[test]
fn given_live_status_when_evaluated_then_sends_immediately() {
    // GIVEN/WHEN/THEN: Both live statuses send, regardless of launch time
    for status in [TunnelStatus::Connected, TunnelStatus::Reasserting] {
        assert_eq!(evaluate_fresh(status, Duration::ZERO), StatusAction::Send);
        assert_eq!(
            evaluate_fresh(status, Duration::from_secs(60)),
            StatusAction::Send
        );
    }
}

/// **VALUE**: A freshly launched connecting tunnel is left alone for the rest of
/// the grace delay.
///
/// **WHY THIS MATTERS**: Talking to the tunnel too early during start-up can freeze it.
#[test]
fn given_connecting_within_grace_delay_when_evaluated_then_waits_for_remainder() {
    // GIVEN: Tunnel launched 2 seconds ago
    let elapsed = Duration::from_secs(2);

    // WHEN: Evaluating a connecting status
    let action = evaluate_fresh(TunnelStatus::Connecting, elapsed);

    // THEN: Wait exactly for what is left of the 5 second delay
    assert_eq!(
        action,
        StatusAction::WaitForConnecting {
            remaining: Duration::from_secs(3)
        }
    );
}

#[test]
fn given_connecting_past_grace_delay_when_evaluated_then_sends_immediately() {
    assert_eq!(
        evaluate_fresh(TunnelStatus::Connecting, CONNECTING_STATE_WAIT_DELAY),
        StatusAction::Send,
        "Elapsed == delay should not wait"
    );
    assert_eq!(
        evaluate_fresh(TunnelStatus::Connecting, Duration::from_secs(30)),
        StatusAction::Send
    );
}

/// **VALUE**: Down statuses fail fast with the status that caused it.
///
/// **BUG THIS CATCHES**: Would catch a missing arm that lets an operation sit
/// until its timeout on a tunnel that is never coming back.
#[test]
fn given_down_status_when_evaluated_then_fails_with_that_status() {
    for status in [
        TunnelStatus::Invalid,
        TunnelStatus::Disconnected,
        TunnelStatus::Disconnecting,
    ] {
        assert_eq!(
            evaluate_fresh(status, Duration::ZERO),
            StatusAction::Fail(status)
        );
    }
}

#[test]
fn given_unknown_status_when_evaluated_then_ignores_it() {
    assert_eq!(
        evaluate_fresh(TunnelStatus::Unknown(42), Duration::ZERO),
        StatusAction::Ignore
    );
}

/// **VALUE**: Once cancelled or sent, no status can trigger another action.
///
/// **WHY THIS MATTERS**: This guard is what prevents duplicate sends when a
/// notification arrives after the message went out.
#[test]
fn given_cancelled_or_sent_when_evaluated_then_every_status_is_ignored() {
    let statuses = [
        TunnelStatus::Connected,
        TunnelStatus::Connecting,
        TunnelStatus::Reasserting,
        TunnelStatus::Disconnected,
        TunnelStatus::Invalid,
    ];

    for status in statuses {
        for (cancelled, sent) in [(true, false), (false, true), (true, true)] {
            assert_eq!(
                evaluate(
                    status,
                    cancelled,
                    sent,
                    Duration::ZERO,
                    CONNECTING_STATE_WAIT_DELAY
                ),
                StatusAction::Ignore,
                "status {status} cancelled={cancelled} sent={sent}"
            );
        }
    }
}

#[test]
fn given_zero_grace_delay_when_connecting_then_sends_immediately() {
    assert_eq!(
        evaluate(
            TunnelStatus::Connecting,
            false,
            false,
            Duration::ZERO,
            Duration::ZERO
        ),
        StatusAction::Send
    );
}
