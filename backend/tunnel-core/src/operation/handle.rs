use crate::error::send_message::SendMessageError;
use crate::operation::OperationState;
use crate::operation::send_message::OperationEvent;

use log::trace;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Handle to a started operation.
///
/// Dropping the handle does not cancel the operation; it still runs to
/// completion and notifies its completion handler.
pub struct OperationHandle<O> {
    id: Uuid,
    events: mpsc::UnboundedSender<OperationEvent>,
    state: watch::Receiver<OperationState>,
    result: oneshot::Receiver<Result<O, SendMessageError>>,
}

impl<O> OperationHandle<O> {
    pub(crate) fn new(
        id: Uuid,
        events: mpsc::UnboundedSender<OperationEvent>,
        state: watch::Receiver<OperationState>,
        result: oneshot::Receiver<Result<O, SendMessageError>>,
    ) -> Self {
        Self {
            id,
            events,
            state,
            result,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation.
    ///
    /// Resolves the operation with `Cancelled` unless it already finished or
    /// the message was already sent, in which case the send path keeps
    /// ownership of the outcome.
    pub fn cancel(&self) {
        if self.events.send(OperationEvent::Cancel).is_err() {
            trace!("[{}] Cancel requested after operation finished", self.id);
        }
    }

    pub fn state(&self) -> OperationState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait for the final result.
    ///
    /// If the operation was torn down without resolving (its runtime shut
    /// down), this reports `Cancelled`.
    pub async fn result(self) -> Result<O, SendMessageError> {
        match self.result.await {
            Ok(result) => result,
            Err(_) => Err(SendMessageError::cancelled()),
        }
    }
}
