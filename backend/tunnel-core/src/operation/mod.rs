//! Send-message operation.
//!
//! A single-shot, cancellable round trip to the tunnel process. All state is
//! owned by one actor task; status notifications, timer fires, replies and
//! cancellation reach it as events over an mpsc channel, so every mutation is
//! serialized without locks.
//!
//! ```text
//! Created → Observing → (WaitingForConnecting) → Sending → Completed | Failed
//!                  └──────────────┴──────────────────┴──→ Cancelled
//! ```

pub(crate) mod completion;
pub mod dispatch;
mod handle;
mod send_message;
pub(crate) mod timers;

pub use completion::CompletionHandler;
pub use handle::OperationHandle;
pub use send_message::{DecoderHandler, SendTunnelMessageOperation};

use std::fmt::{Display, Formatter, Result as FormatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Created,
    Observing,
    WaitingForConnecting,
    Sending,
    Completed,
    Failed,
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed | OperationState::Cancelled
        )
    }
}

impl Display for OperationState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            OperationState::Created => "created",
            OperationState::Observing => "observing",
            OperationState::WaitingForConnecting => "waiting-for-connecting",
            OperationState::Sending => "sending",
            OperationState::Completed => "completed",
            OperationState::Failed => "failed",
            OperationState::Cancelled => "cancelled",
        };
        write!(formatter, "{name}")
    }
}
