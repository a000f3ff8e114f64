//! Status-driven dispatch policy.

use crate::tunnel::TunnelStatus;

use std::time::Duration;

/// What the operation does in response to a tunnel status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusAction {
    /// No state change.
    Ignore,
    /// Send the message now.
    Send,
    /// Hold the send back for `remaining` and extend the timeout by as much.
    WaitForConnecting { remaining: Duration },
    /// Fail with `TunnelDown(status)`.
    Fail(TunnelStatus),
}

/// Decide how to react to `status`.
///
/// Depends only on its arguments, so the initial synchronous check and later
/// notifications are evaluated identically.
pub fn evaluate(
    status: TunnelStatus,
    cancelled: bool,
    message_sent: bool,
    time_since_launch: Duration,
    connecting_state_wait_delay: Duration,
) -> StatusAction {
    if cancelled || message_sent {
        return StatusAction::Ignore;
    }

    match status {
        TunnelStatus::Connected | TunnelStatus::Reasserting => StatusAction::Send,
        TunnelStatus::Connecting => {
            if time_since_launch >= connecting_state_wait_delay {
                StatusAction::Send
            } else {
                StatusAction::WaitForConnecting {
                    remaining: connecting_state_wait_delay - time_since_launch,
                }
            }
        }
        TunnelStatus::Invalid | TunnelStatus::Disconnecting | TunnelStatus::Disconnected => {
            StatusAction::Fail(status)
        }
        TunnelStatus::Unknown(_) => StatusAction::Ignore,
    }
}
