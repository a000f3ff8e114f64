// Unit tests for the two-slot timer registry.
// Time is paused so every deadline is exact.

use crate::operation::timers::{OperationTimers, TimerKind, TimerSlot};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{Instant, advance};

type Fired = Arc<Mutex<Vec<(TimerKind, u64)>>>;

fn recorder() -> (Fired, impl Fn() -> Box<dyn FnOnce(TimerKind, u64) + Send>) {
    let fired: Fired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired);
    let make = move || {
        let sink = Arc::clone(&sink);
        Box::new(move |kind: TimerKind, generation: u64| sink.lock().unwrap().push((kind, generation)))
            as Box<dyn FnOnce(TimerKind, u64) + Send>
    };
    (fired, make)
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

/// **VALUE**: An armed timer fires once at its deadline with its generation.
#[tokio::test(start_paused = true)]
async fn given_armed_slot_when_deadline_passes_then_fires_once() {
    // GIVEN: A timeout slot armed for 5 seconds
    let (fired, make) = recorder();
    let mut slot = TimerSlot::new(TimerKind::Timeout);
    let start = Instant::now();
    let deadline = slot.arm(Duration::from_secs(5), make());

    // THEN: Deadline is exactly 5 seconds out
    assert_eq!(deadline - start, Duration::from_secs(5));
    assert!(slot.is_armed());

    // WHEN: Just before the deadline
    advance(Duration::from_millis(4_999)).await;
    settle().await;
    assert!(fired.lock().unwrap().is_empty(), "Should not fire early");

    // WHEN: At the deadline
    advance(Duration::from_millis(1)).await;
    settle().await;

    // THEN: Fired once with generation 1
    assert_eq!(*fired.lock().unwrap(), vec![(TimerKind::Timeout, 1)]);
    assert!(slot.take_fired(1));
    assert!(!slot.is_armed());
}

/// **VALUE**: Re-arming replaces the pending timer.
///
/// **WHY THIS MATTERS**: The timeout is re-armed when the connecting grace wait
/// extends the deadline. If the first timer survived, the operation would
/// time out 5 seconds too early.
///
/// **BUG THIS CATCHES**: Would catch if `arm()` forgot to abort the old task.
#[tokio::test(start_paused = true)]
async fn given_rearmed_slot_when_old_deadline_passes_then_only_new_timer_fires() {
    // GIVEN: Slot armed for 5s, then re-armed for 10s
    let (fired, make) = recorder();
    let mut slot = TimerSlot::new(TimerKind::Timeout);
    slot.arm(Duration::from_secs(5), make());
    slot.arm(Duration::from_secs(10), make());

    // WHEN: Passing the first deadline
    advance(Duration::from_secs(6)).await;
    settle().await;

    // THEN: Nothing fired
    assert!(fired.lock().unwrap().is_empty());

    // WHEN: Passing the second deadline
    advance(Duration::from_secs(4)).await;
    settle().await;

    // THEN: Only generation 2 fired
    assert_eq!(*fired.lock().unwrap(), vec![(TimerKind::Timeout, 2)]);
}

/// **VALUE**: A fire notification from a replaced timer is recognised as stale.
///
/// **WHY THIS MATTERS**: A timer can fire and queue its event just before the
/// operation re-arms or cancels it. The generation check keeps that queued
/// event inert.
#[tokio::test(start_paused = true)]
async fn given_stale_generation_when_take_fired_then_rejected() {
    let (_fired, make) = recorder();
    let mut slot = TimerSlot::new(TimerKind::ConnectingStateWait);

    slot.arm(Duration::from_secs(1), make());
    slot.arm(Duration::from_secs(1), make());

    assert!(!slot.take_fired(1), "Replaced generation must be stale");
    assert!(slot.is_armed(), "Stale fire must not disarm the current timer");
    assert!(slot.take_fired(2));
}

#[tokio::test(start_paused = true)]
async fn given_cancelled_slot_when_cancelled_again_then_no_op() {
    // GIVEN: An armed slot
    let (fired, make) = recorder();
    let mut slot = TimerSlot::new(TimerKind::Timeout);
    slot.arm(Duration::from_secs(1), make());

    // WHEN: Cancelling twice and letting time pass
    slot.cancel();
    slot.cancel();
    advance(Duration::from_secs(2)).await;
    settle().await;

    // THEN: Never fired, disarmed, fire acknowledgements rejected
    assert!(fired.lock().unwrap().is_empty());
    assert!(!slot.is_armed());
    assert!(!slot.take_fired(1));
}

#[tokio::test(start_paused = true)]
async fn given_both_slots_armed_when_cancel_all_then_neither_fires() {
    let (fired, make) = recorder();
    let mut timers = OperationTimers::new();
    timers.timeout.arm(Duration::from_secs(5), make());
    timers
        .connecting_state_wait
        .arm(Duration::from_secs(3), make());

    timers.cancel_all();
    advance(Duration::from_secs(10)).await;
    settle().await;

    assert!(fired.lock().unwrap().is_empty());
    assert!(!timers.slot_mut(TimerKind::Timeout).is_armed());
    assert!(!timers.slot_mut(TimerKind::ConnectingStateWait).is_armed());
}

/// Slots are independent: cancelling one leaves the other running.
#[tokio::test(start_paused = true)]
async fn given_two_slots_when_one_cancelled_then_other_still_fires() {
    let (fired, make) = recorder();
    let mut timers = OperationTimers::new();
    timers.timeout.arm(Duration::from_secs(5), make());
    timers
        .connecting_state_wait
        .arm(Duration::from_secs(3), make());

    timers.connecting_state_wait.cancel();
    advance(Duration::from_secs(5)).await;
    settle().await;

    assert_eq!(*fired.lock().unwrap(), vec![(TimerKind::Timeout, 1)]);
}

/// **VALUE**: A delay too large for `Instant` arithmetic arms a far-future
/// timer instead of panicking.
///
/// **BUG THIS CATCHES**: `Instant::now() + Duration::MAX` overflowing inside
/// the operation task, which kills the task before it can report a result.
#[tokio::test(start_paused = true)]
async fn given_unbounded_delay_when_armed_then_deadline_is_far_future_and_no_fire() {
    // GIVEN: A timeout slot
    let (fired, make) = recorder();
    let mut slot = TimerSlot::new(TimerKind::Timeout);
    let start = Instant::now();

    // WHEN: Arming with the largest possible delay
    let deadline = slot.arm(Duration::MAX, make());
    advance(Duration::from_secs(86_400)).await;
    settle().await;

    // THEN: Armed with a deadline years away, nothing fired
    assert!(slot.is_armed());
    assert!(deadline - start > Duration::from_secs(86_400 * 365));
    assert!(fired.lock().unwrap().is_empty());

    slot.cancel();
}
