//! Background execution budget.
//!
//! A host may only keep the process running for a limited time while it is
//! not in the foreground. Operations query the remaining budget before
//! sending and register a named background task for their lifetime.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};

/// Called by the host when a background task runs out of time.
pub type ExpirationHandler = Box<dyn FnOnce() + Send>;

/// Budget reported by hosts that never suspend the process. Never fails the
/// budget check, whatever the timeout.
pub const UNLIMITED_BACKGROUND_TIME: Duration = Duration::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

pub trait BackgroundTaskProvider: Send + Sync {
    /// Time the host still grants the process while in the background.
    fn background_time_remaining(&self) -> Duration;

    /// Start a named background task. Returns `None` when the host does not
    /// track background tasks.
    fn begin_background_task(
        &self,
        name: &str,
        expiration_handler: ExpirationHandler,
    ) -> Option<BackgroundTaskId>;

    fn end_background_task(&self, id: BackgroundTaskId);
}

/// Provider for hosts without background limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForegroundTaskProvider;

impl BackgroundTaskProvider for ForegroundTaskProvider {
    fn background_time_remaining(&self) -> Duration {
        UNLIMITED_BACKGROUND_TIME
    }

    fn begin_background_task(
        &self,
        _name: &str,
        _expiration_handler: ExpirationHandler,
    ) -> Option<BackgroundTaskId> {
        None
    }

    fn end_background_task(&self, _id: BackgroundTaskId) {}
}

struct BudgetState {
    remaining: Duration,
    next_id: u64,
    tasks: HashMap<BackgroundTaskId, (String, ExpirationHandler)>,
}

/// Provider with a fixed, adjustable budget whose tasks can be expired on demand.
pub struct BudgetedTaskProvider {
    state: Mutex<BudgetState>,
}

impl BudgetedTaskProvider {
    pub fn new(remaining: Duration) -> Self {
        Self {
            state: Mutex::new(BudgetState {
                remaining,
                next_id: 0,
                tasks: HashMap::new(),
            }),
        }
    }

    pub fn set_time_remaining(&self, remaining: Duration) {
        self.lock().remaining = remaining;
    }

    /// Names of the tasks that have begun and not yet ended.
    pub fn active_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .tasks
            .values()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Run the expiration handler of every active task, ending them.
    pub fn expire_all(&self) {
        let expired: Vec<(String, ExpirationHandler)> =
            self.lock().tasks.drain().map(|(_, task)| task).collect();

        for (name, handler) in expired {
            warn!("Background task expired: {name}");
            handler();
        }
    }

    fn lock(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BackgroundTaskProvider for BudgetedTaskProvider {
    fn background_time_remaining(&self) -> Duration {
        self.lock().remaining
    }

    fn begin_background_task(
        &self,
        name: &str,
        expiration_handler: ExpirationHandler,
    ) -> Option<BackgroundTaskId> {
        let mut state = self.lock();
        let id = BackgroundTaskId(state.next_id);
        state.next_id += 1;
        state
            .tasks
            .insert(id, (name.to_string(), expiration_handler));
        debug!("Background task {} began: {name}", id.0);
        Some(id)
    }

    fn end_background_task(&self, id: BackgroundTaskId) {
        if let Some((name, _)) = self.lock().tasks.remove(&id) {
            debug!("Background task {} ended: {name}", id.0);
        }
    }
}
