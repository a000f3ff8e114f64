// Unit tests for the loopback tunnel's observer registry and reply behaviour.

use crate::error::tunnel::TunnelError;
use crate::tunnel::{LoopbackTunnel, ReplyBehavior, Tunnel, TunnelStatus};

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use tokio::sync::oneshot;

/// **VALUE**: Invalidating a subscription stops notifications.
///
/// **WHY THIS MATTERS**: Operations rely on this to stop receiving status events
/// after they send or finish.
#[test]
fn given_subscription_when_invalidated_then_observer_stops_receiving() {
    // GIVEN: A tunnel with one observer
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connecting);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut subscription =
        tunnel.add_status_observer(Arc::new(move |status: TunnelStatus| sink.lock().unwrap().push(status)));

    // WHEN: Status changes, then the subscription is invalidated, then status changes again
    tunnel.set_status(TunnelStatus::Connected);
    subscription.invalidate();
    tunnel.set_status(TunnelStatus::Disconnected);

    // THEN: Only the first change was observed and the registry is empty
    assert_eq!(*seen.lock().unwrap(), vec![TunnelStatus::Connected]);
    assert_eq!(tunnel.observer_count(), 0);
    assert!(!subscription.is_active());
}

#[test]
fn given_subscription_when_dropped_then_observer_is_removed() {
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);

    let subscription = tunnel.add_status_observer(Arc::new(|_: TunnelStatus| {}));
    assert_eq!(tunnel.observer_count(), 1);

    drop(subscription);
    assert_eq!(tunnel.observer_count(), 0);
}

#[test]
fn given_launched_tunnel_when_queried_then_reports_elapsed_time() {
    let tunnel = LoopbackTunnel::launched(TunnelStatus::Connecting, Duration::from_secs(3));

    let elapsed = tunnel.time_since_launch();

    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(4));
}

#[test]
fn given_unknown_or_future_start_date_when_queried_then_elapsed_is_zero() {
    let unknown = LoopbackTunnel::new(TunnelStatus::Connecting).with_start_date(None);
    assert_eq!(unknown.time_since_launch(), Duration::ZERO);

    let future = LoopbackTunnel::new(TunnelStatus::Connecting)
        .with_start_date(Some(SystemTime::now() + Duration::from_secs(60)));
    assert_eq!(future.time_since_launch(), Duration::ZERO);
}

#[tokio::test]
async fn given_echo_tunnel_when_message_sent_then_replies_with_payload() {
    // GIVEN: A connected echo tunnel
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
    let (reply_tx, reply_rx) = oneshot::channel();

    // WHEN: Sending a message
    tunnel
        .send_provider_message(
            b"ping".to_vec(),
            Box::new(move |response: Option<Vec<u8>>| {
                let _ = reply_tx.send(response);
            }),
        )
        .unwrap();

    // THEN: Reply echoes the payload and the message was recorded
    assert_eq!(reply_rx.await.unwrap(), Some(b"ping".to_vec()));
    assert_eq!(tunnel.sent_messages(), vec![b"ping".to_vec()]);
}

#[test]
fn given_rejecting_tunnel_when_message_sent_then_returns_submit_error() {
    let tunnel = LoopbackTunnel::new(TunnelStatus::Connected)
        .with_reply(ReplyBehavior::Reject(String::from("session closed")));

    let result = tunnel.send_provider_message(b"ping".to_vec(), Box::new(|_: Option<Vec<u8>>| {}));

    let err = result.unwrap_err();
    assert!(matches!(err, TunnelError::Submit { .. }));
    assert!(err.to_string().contains("session closed"));
    assert!(tunnel.sent_messages().is_empty());
}

#[test]
fn given_invalid_tunnel_when_message_sent_then_returns_not_connected() {
    let tunnel = LoopbackTunnel::new(TunnelStatus::Invalid);

    let result = tunnel.send_provider_message(Vec::new(), Box::new(|_: Option<Vec<u8>>| {}));

    assert!(matches!(result, Err(TunnelError::NotConnected { .. })));
}
