//! In-process tunnel.
//!
//! Stands in for the tunnel process when there is none to talk to: the probe
//! CLI drives operations against it and the test suites script status
//! transitions and replies with it.

use crate::error::tunnel::TunnelError;
use crate::tunnel::{ReplyHandler, StatusObserver, StatusSubscription, Tunnel, TunnelStatus};

use common::ErrorLocation;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime};

use log::{debug, trace};

/// How the loopback tunnel answers provider messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyBehavior {
    /// Reply with the submitted payload.
    Echo,
    /// Reply with a fixed payload.
    Respond(Option<Vec<u8>>),
    /// Accept the message and never reply.
    NoReply,
    /// Refuse the submission with the given reason.
    Reject(String),
}

struct LoopbackState {
    status: TunnelStatus,
    start_date: Option<SystemTime>,
    observers: HashMap<u64, StatusObserver>,
    next_observer_id: u64,
    reply: ReplyBehavior,
    reply_delay: Duration,
    sent: Vec<Vec<u8>>,
}

/// Cloneable handle; all clones share the same tunnel.
#[derive(Clone)]
pub struct LoopbackTunnel {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTunnel {
    /// Tunnel launched just now.
    pub fn new(status: TunnelStatus) -> Self {
        Self::launched(status, Duration::ZERO)
    }

    /// Tunnel launched `elapsed` ago.
    pub fn launched(status: TunnelStatus, elapsed: Duration) -> Self {
        let start_date = SystemTime::now().checked_sub(elapsed);
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                status,
                start_date,
                observers: HashMap::new(),
                next_observer_id: 0,
                reply: ReplyBehavior::Echo,
                reply_delay: Duration::ZERO,
                sent: Vec::new(),
            })),
        }
    }

    pub fn with_reply(self, reply: ReplyBehavior) -> Self {
        self.lock().reply = reply;
        self
    }

    pub fn with_reply_delay(self, delay: Duration) -> Self {
        self.lock().reply_delay = delay;
        self
    }

    pub fn with_start_date(self, start_date: Option<SystemTime>) -> Self {
        self.lock().start_date = start_date;
        self
    }

    /// Change the status and notify every registered observer.
    pub fn set_status(&self, status: TunnelStatus) {
        let observers: Vec<StatusObserver> = {
            let mut state = self.lock();
            state.status = status;
            state.observers.values().cloned().collect()
        };

        debug!(
            "Loopback tunnel status -> {status} ({} observers)",
            observers.len()
        );

        for observer in observers {
            observer(status);
        }
    }

    /// Payloads accepted so far, oldest first.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Tunnel for LoopbackTunnel {
    fn status(&self) -> TunnelStatus {
        self.lock().status
    }

    fn start_date(&self) -> Option<SystemTime> {
        self.lock().start_date
    }

    fn add_status_observer(&self, observer: StatusObserver) -> StatusSubscription {
        let id = {
            let mut state = self.lock();
            let id = state.next_observer_id;
            state.next_observer_id += 1;
            state.observers.insert(id, observer);
            id
        };
        trace!("Loopback tunnel observer {id} added");

        let weak: Weak<Mutex<LoopbackState>> = Arc::downgrade(&self.state);
        StatusSubscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .observers
                    .remove(&id);
                trace!("Loopback tunnel observer {id} removed");
            }
        })
    }

    fn send_provider_message(
        &self,
        message: Vec<u8>,
        reply_handler: ReplyHandler,
    ) -> Result<(), TunnelError> {
        let (response, delay) = {
            let mut state = self.lock();

            if state.status == TunnelStatus::Invalid {
                return Err(TunnelError::NotConnected {
                    message: "Tunnel configuration is invalid".to_string(),
                    location: ErrorLocation::caller(),
                });
            }

            let response = match &state.reply {
                ReplyBehavior::Reject(reason) => {
                    return Err(TunnelError::Submit {
                        message: reason.clone(),
                        location: ErrorLocation::caller(),
                    });
                }
                ReplyBehavior::Echo => Some(Some(message.clone())),
                ReplyBehavior::Respond(payload) => Some(payload.clone()),
                ReplyBehavior::NoReply => None,
            };

            state.sent.push(message);
            (response, state.reply_delay)
        };

        let Some(response) = response else {
            debug!("Loopback tunnel accepted message, no reply will be sent");
            return Ok(());
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    reply_handler(response);
                });
            }
            Err(_) => reply_handler(response),
        }

        Ok(())
    }
}
