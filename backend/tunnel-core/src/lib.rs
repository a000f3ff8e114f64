//! Tunnel IPC core.
//!
//! Delivers control messages to a privileged VPN tunnel process and waits for
//! a decoded reply, reacting to tunnel status changes along the way. See
//! [`operation::SendTunnelMessageOperation`] for the entry point.

pub mod background;
pub mod codec;
pub mod config;
pub mod error;
pub mod operation;
pub mod tunnel;

#[cfg(test)]
mod tests;

use std::time::Duration;

/// Delay before talking to a tunnel that reports `connecting`.
///
/// Messaging the tunnel too early during start-up can freeze it, so sends are
/// held back until this much time has passed since launch.
pub const CONNECTING_STATE_WAIT_DELAY: Duration = Duration::from_secs(5);

/// Timeout applied when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub use background::{BackgroundTaskProvider, BudgetedTaskProvider, ForegroundTaskProvider};
pub use codec::{JsonMessage, RawMessage, TunnelMessage};
pub use config::{IpcConfig, OperationConfig};
pub use error::CoreError;
pub use operation::{OperationHandle, SendTunnelMessageOperation};
pub use tunnel::{LoopbackTunnel, StatusSubscription, Tunnel, TunnelStatus};
