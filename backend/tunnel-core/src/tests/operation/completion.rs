use crate::error::send_message::SendMessageError;
use crate::operation::completion::Completion;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::oneshot;

/// **VALUE**: Only the first `complete` has any effect.
///
/// **WHY THIS MATTERS**: Timeout, reply and cancellation can race to finish the
/// same operation. The caller must be notified exactly once with the winner.
#[test]
fn given_completed_when_completed_again_then_second_result_is_dropped() {
    // GIVEN: A completion with a counting handler
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);
    let (result_tx, mut result_rx) = oneshot::channel();
    let mut completion: Completion<u32> = Completion::new(
        Some(Box::new(move |result: &Result<u32, SendMessageError>| {
            assert!(matches!(result, Ok(7)));
            handler_calls.fetch_add(1, Ordering::SeqCst);
        })),
        result_tx,
    );

    // WHEN: Completing twice
    assert!(completion.complete(Ok(7)));
    assert!(!completion.complete(Err(SendMessageError::timeout())));

    // THEN: Handler ran once and the first result was delivered
    assert!(completion.is_finished());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(result_rx.try_recv(), Ok(Ok(7))));
}

#[test]
fn given_dropped_receiver_when_completed_then_handler_still_runs() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);
    let (result_tx, result_rx) = oneshot::channel::<Result<(), SendMessageError>>();
    drop(result_rx);

    let mut completion = Completion::new(
        Some(Box::new(move |_: &Result<(), SendMessageError>| {
            handler_calls.fetch_add(1, Ordering::SeqCst);
        })),
        result_tx,
    );

    assert!(completion.complete(Err(SendMessageError::cancelled())));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
