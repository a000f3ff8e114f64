//! Tunnel abstraction.
//!
//! A [`Tunnel`] is the handle to the separately running, privileged tunnel
//! process: it reports connection status, notifies observers about status
//! changes and accepts provider messages with an asynchronous reply.

pub mod loopback;
mod status;
mod subscription;

pub use loopback::{LoopbackTunnel, ReplyBehavior};
pub use status::TunnelStatus;
pub use subscription::StatusSubscription;

use crate::error::tunnel::TunnelError;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Callback invoked with every status change until its subscription is invalidated.
pub type StatusObserver = Arc<dyn Fn(TunnelStatus) + Send + Sync>;

/// One-shot callback receiving the tunnel's reply payload (possibly absent).
pub type ReplyHandler = Box<dyn FnOnce(Option<Vec<u8>>) + Send>;

pub trait Tunnel: Send + Sync {
    /// Current connection status.
    fn status(&self) -> TunnelStatus;

    /// When the tunnel process was launched, if known.
    fn start_date(&self) -> Option<SystemTime>;

    /// Register `observer` for status changes.
    ///
    /// Observers may be invoked from any thread. Dropping or invalidating the
    /// returned subscription stops delivery.
    fn add_status_observer(&self, observer: StatusObserver) -> StatusSubscription;

    /// Submit `message` to the tunnel process.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError`] when the message could not be handed to the
    /// transport. On success `reply_handler` is invoked at most once, from any
    /// thread, with the reply payload.
    fn send_provider_message(
        &self,
        message: Vec<u8>,
        reply_handler: ReplyHandler,
    ) -> Result<(), TunnelError>;

    /// Time elapsed since launch; zero when the launch time is unknown or in the future.
    fn time_since_launch(&self) -> Duration {
        self.start_date()
            .and_then(|start| SystemTime::now().duration_since(start).ok())
            .unwrap_or_default()
    }
}
