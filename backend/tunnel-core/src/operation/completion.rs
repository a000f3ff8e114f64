use crate::error::send_message::SendMessageError;

use tokio::sync::oneshot;

/// Observer notified exactly once with the operation's final result.
pub type CompletionHandler<O> = Box<dyn FnOnce(&Result<O, SendMessageError>) + Send>;

/// One-shot completion: the first `complete` wins, later calls are ignored.
pub(crate) struct Completion<O> {
    handler: Option<CompletionHandler<O>>,
    result_tx: Option<oneshot::Sender<Result<O, SendMessageError>>>,
    finished: bool,
}

impl<O> Completion<O> {
    pub(crate) fn new(
        handler: Option<CompletionHandler<O>>,
        result_tx: oneshot::Sender<Result<O, SendMessageError>>,
    ) -> Self {
        Self {
            handler,
            result_tx: Some(result_tx),
            finished: false,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// Record `result`, notify the handler, then hand the result to the
    /// operation handle. Returns `false` if already completed.
    pub(crate) fn complete(&mut self, result: Result<O, SendMessageError>) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;

        if let Some(handler) = self.handler.take() {
            handler(&result);
        }

        if let Some(result_tx) = self.result_tx.take() {
            // Receiver is gone when the handle was dropped.
            let _ = result_tx.send(result);
        }

        true
    }
}
