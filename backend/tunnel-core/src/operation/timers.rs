//! Two-slot timer registry.
//!
//! Each slot holds at most one pending one-shot timer. Arming a slot aborts
//! whatever it held before. Every arm bumps the slot's generation and the
//! fire callback receives it, so a timer that fired just before being
//! replaced or cancelled is recognised as stale by [`TimerSlot::take_fired`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Timeout,
    ConnectingStateWait,
}

/// Stand-in deadline for delays too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct PendingTimer {
    generation: u64,
    task: JoinHandle<()>,
}

pub(crate) struct TimerSlot {
    kind: TimerKind,
    generation: u64,
    pending: Option<PendingTimer>,
}

impl TimerSlot {
    pub(crate) fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            pending: None,
        }
    }

    /// Schedule `fire` to run after `delay`, replacing any pending timer.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn arm<F>(&mut self, delay: Duration, fire: F) -> Instant
    where
        F: FnOnce(TimerKind, u64) + Send + 'static,
    {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let kind = self.kind;
        let now = Instant::now();
        let deadline = now.checked_add(delay).unwrap_or(now + FAR_FUTURE);

        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(kind, generation);
        });

        self.pending = Some(PendingTimer { generation, task });
        deadline
    }

    /// Abort the pending timer, if any. Idempotent.
    pub(crate) fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }

    /// Acknowledge a fire notification.
    ///
    /// Returns `true` only for the currently armed timer, which is then
    /// disarmed. Fires from cancelled or replaced timers return `false`.
    pub(crate) fn take_fired(&mut self, generation: u64) -> bool {
        match &self.pending {
            Some(pending) if pending.generation == generation => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub(crate) struct OperationTimers {
    pub(crate) timeout: TimerSlot,
    pub(crate) connecting_state_wait: TimerSlot,
}

impl OperationTimers {
    pub(crate) fn new() -> Self {
        Self {
            timeout: TimerSlot::new(TimerKind::Timeout),
            connecting_state_wait: TimerSlot::new(TimerKind::ConnectingStateWait),
        }
    }

    pub(crate) fn slot_mut(&mut self, kind: TimerKind) -> &mut TimerSlot {
        match kind {
            TimerKind::Timeout => &mut self.timeout,
            TimerKind::ConnectingStateWait => &mut self.connecting_state_wait,
        }
    }

    pub(crate) fn cancel_all(&mut self) {
        self.timeout.cancel();
        self.connecting_state_wait.cancel();
    }
}
