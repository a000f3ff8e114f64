use crate::background::{
    BackgroundTaskId, BackgroundTaskProvider, UNLIMITED_BACKGROUND_TIME,
};
use crate::codec::TunnelMessage;
use crate::config::OperationConfig;
use crate::error::codec::DecodeError;
use crate::error::send_message::SendMessageError;
use crate::operation::OperationState;
use crate::operation::completion::{Completion, CompletionHandler};
use crate::operation::dispatch::{self, StatusAction};
use crate::operation::handle::OperationHandle;
use crate::operation::timers::{OperationTimers, TimerKind};
use crate::tunnel::{ReplyHandler, StatusObserver, StatusSubscription, Tunnel, TunnelStatus};
use crate::{CONNECTING_STATE_WAIT_DELAY, DEFAULT_TIMEOUT};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Turns the tunnel's reply payload (possibly absent) into the operation's output.
pub type DecoderHandler<O> = Box<dyn FnOnce(Option<Vec<u8>>) -> Result<O, DecodeError> + Send>;

/// Events processed by the operation actor.
///
/// Everything that can touch operation state from outside the actor is
/// turned into one of these first.
pub(crate) enum OperationEvent {
    StatusChanged(TunnelStatus),
    TimerFired(TimerKind, u64),
    Reply(Option<Vec<u8>>),
    Cancel,
    BackgroundTaskExpired,
}

/// Delivers one message to the tunnel process and waits for the decoded reply.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use tunnel_core::codec::{RawMessage, decode_utf8};
/// use tunnel_core::{ForegroundTaskProvider, LoopbackTunnel, SendTunnelMessageOperation, TunnelStatus};
///
/// # async fn run() {
/// let tunnel = LoopbackTunnel::new(TunnelStatus::Connected);
/// let operation = SendTunnelMessageOperation::new(
///     Arc::new(tunnel),
///     Arc::new(ForegroundTaskProvider),
///     RawMessage::new("ping", b"ping".to_vec()),
///     decode_utf8,
/// );
/// let reply = operation.start().result().await;
/// # }
/// ```
pub struct SendTunnelMessageOperation<M, O> {
    id: Uuid,
    tunnel: Arc<dyn Tunnel>,
    background: Arc<dyn BackgroundTaskProvider>,
    message: M,
    timeout: Duration,
    connecting_state_wait_delay: Duration,
    decoder: DecoderHandler<O>,
    completion_handler: Option<CompletionHandler<O>>,
}

impl<M, O> SendTunnelMessageOperation<M, O>
where
    M: TunnelMessage,
    O: Send + 'static,
{
    pub fn new<D>(
        tunnel: Arc<dyn Tunnel>,
        background: Arc<dyn BackgroundTaskProvider>,
        message: M,
        decoder: D,
    ) -> Self
    where
        D: FnOnce(Option<Vec<u8>>) -> Result<O, DecodeError> + Send + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            tunnel,
            background,
            message,
            timeout: DEFAULT_TIMEOUT,
            connecting_state_wait_delay: CONNECTING_STATE_WAIT_DELAY,
            decoder: Box::new(decoder),
            completion_handler: None,
        }
    }

    /// Apply configured timeout and connecting-state wait delay.
    ///
    /// Call before [`with_timeout`](Self::with_timeout) to let a per-call
    /// timeout take precedence.
    pub fn with_config(mut self, config: &OperationConfig) -> Self {
        self.timeout = config.timeout;
        self.connecting_state_wait_delay = config.connecting_state_wait_delay;
        self
    }

    /// `None` falls back to [`DEFAULT_TIMEOUT`].
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        self
    }

    pub fn with_connecting_state_wait_delay(mut self, delay: Duration) -> Self {
        self.connecting_state_wait_delay = delay;
        self
    }

    pub fn on_completion<F>(mut self, handler: F) -> Self
    where
        F: FnOnce(&Result<O, SendMessageError>) + Send + 'static,
    {
        self.completion_handler = Some(Box::new(handler));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Spawn the operation actor and return its handle.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(self) -> OperationHandle<O> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(OperationState::Created);
        let (result_tx, result_rx) = oneshot::channel();

        let actor = OperationActor {
            id: self.id,
            tunnel: self.tunnel,
            background: self.background,
            message: self.message,
            timeout: self.timeout,
            connecting_state_wait_delay: self.connecting_state_wait_delay,
            decoder: Some(self.decoder),
            events: events_tx.clone(),
            state: state_tx,
            subscription: None,
            timers: OperationTimers::new(),
            background_task: None,
            message_sent: false,
            cancelled: false,
            completion: Completion::new(self.completion_handler, result_tx),
        };

        tokio::spawn(actor.run(events_rx));

        OperationHandle::new(self.id, events_tx, state_rx, result_rx)
    }
}

/// Owns all mutable operation state. Runs on a single task.
struct OperationActor<M, O> {
    id: Uuid,
    tunnel: Arc<dyn Tunnel>,
    background: Arc<dyn BackgroundTaskProvider>,
    message: M,
    timeout: Duration,
    connecting_state_wait_delay: Duration,
    decoder: Option<DecoderHandler<O>>,

    /// Kept strong so the channel outlives a dropped handle. Callbacks given
    /// to collaborators only get weak senders.
    events: mpsc::UnboundedSender<OperationEvent>,
    state: watch::Sender<OperationState>,

    subscription: Option<StatusSubscription>,
    timers: OperationTimers,
    background_task: Option<BackgroundTaskId>,
    message_sent: bool,
    cancelled: bool,
    completion: Completion<O>,
}

impl<M, O> OperationActor<M, O>
where
    M: TunnelMessage,
    O: Send + 'static,
{
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<OperationEvent>) {
        self.main();

        while !self.completion.is_finished() {
            let Some(event) = events.recv().await else {
                break;
            };
            self.handle_event(event);
        }

        trace!("[{}] Operation actor stopped", self.id);
    }

    fn main(&mut self) {
        info!(
            "[{}] Send tunnel provider message: {} (timeout {:?})",
            self.id, self.message, self.timeout
        );

        self.begin_background_task();
        self.set_timeout_timer(Duration::ZERO);

        let events = self.events.downgrade();
        let observer: StatusObserver = Arc::new(move |status: TunnelStatus| {
            if let Some(events) = events.upgrade() {
                let _ = events.send(OperationEvent::StatusChanged(status));
            }
        });
        self.subscription = Some(self.tunnel.add_status_observer(observer));
        self.set_state(OperationState::Observing);

        let status = self.tunnel.status();
        self.handle_vpn_status(status);
    }

    fn handle_event(&mut self, event: OperationEvent) {
        match event {
            OperationEvent::StatusChanged(status) => self.handle_vpn_status(status),
            OperationEvent::TimerFired(kind, generation) => self.handle_timer(kind, generation),
            OperationEvent::Reply(response) => self.handle_reply(response),
            OperationEvent::Cancel => self.cancel("cancelled by caller"),
            OperationEvent::BackgroundTaskExpired => {
                self.background_task = None;
                self.cancel("background task expired");
            }
        }
    }

    fn handle_vpn_status(&mut self, status: TunnelStatus) {
        let action = dispatch::evaluate(
            status,
            self.cancelled,
            self.message_sent,
            self.tunnel.time_since_launch(),
            self.connecting_state_wait_delay,
        );

        debug!("[{}] Tunnel status {status} -> {action:?}", self.id);

        match action {
            StatusAction::Send => self.send_message(),
            StatusAction::WaitForConnecting { remaining } => {
                self.wait_for_connecting_state(remaining)
            }
            StatusAction::Fail(status) => self.finish(Err(SendMessageError::tunnel_down(status))),
            StatusAction::Ignore => {
                if let TunnelStatus::Unknown(raw) = status
                    && !self.cancelled
                    && !self.message_sent
                {
                    warn!("[{}] Ignoring unknown tunnel status {raw}", self.id);
                }
            }
        }
    }

    fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        if !self.timers.slot_mut(kind).take_fired(generation) {
            trace!("[{}] Stale {kind:?} timer fire ignored", self.id);
            return;
        }

        match kind {
            TimerKind::Timeout => {
                warn!("[{}] Timed out sending {}", self.id, self.message);
                self.finish(Err(SendMessageError::timeout()));
            }
            TimerKind::ConnectingStateWait => {
                if self.cancelled || self.message_sent {
                    return;
                }
                debug!("[{}] Connecting state wait elapsed", self.id);
                self.send_message();
            }
        }
    }

    fn handle_reply(&mut self, response: Option<Vec<u8>>) {
        let Some(decoder) = self.decoder.take() else {
            trace!("[{}] Duplicate reply ignored", self.id);
            return;
        };

        debug!(
            "[{}] Received reply ({} bytes)",
            self.id,
            response.as_ref().map_or(0, Vec::len)
        );

        let result = decoder(response).map_err(SendMessageError::decoding);
        self.finish(result);
    }

    fn cancel(&mut self, reason: &str) {
        if self.completion.is_finished() {
            return;
        }

        self.cancelled = true;

        if self.message_sent {
            info!(
                "[{}] Cancellation ({reason}) ignored, message already sent",
                self.id
            );
            return;
        }

        info!("[{}] Operation {reason}", self.id);
        self.finish(Err(SendMessageError::cancelled()));
    }

    fn set_timeout_timer(&mut self, connecting_state_wait_delay: Duration) {
        let events = self.events.downgrade();
        let deadline = self.timers.timeout.arm(
            self.timeout.saturating_add(connecting_state_wait_delay),
            move |kind, generation| {
                if let Some(events) = events.upgrade() {
                    let _ = events.send(OperationEvent::TimerFired(kind, generation));
                }
            },
        );

        trace!(
            "[{}] Timeout armed, deadline in {:?}",
            self.id,
            deadline.saturating_duration_since(tokio::time::Instant::now())
        );
    }

    fn wait_for_connecting_state(&mut self, remaining: Duration) {
        self.set_state(OperationState::WaitingForConnecting);

        // Extend the deadline to cover the extra wait.
        self.set_timeout_timer(remaining);

        let events = self.events.downgrade();
        self.timers
            .connecting_state_wait
            .arm(remaining, move |kind, generation| {
                if let Some(events) = events.upgrade() {
                    let _ = events.send(OperationEvent::TimerFired(kind, generation));
                }
            });

        debug!(
            "[{}] Tunnel is connecting, delaying send by {remaining:?}",
            self.id
        );
    }

    fn send_message(&mut self) {
        self.message_sent = true;
        self.set_state(OperationState::Sending);

        self.remove_status_observer();
        self.timers.connecting_state_wait.cancel();

        let data = match self.message.encode() {
            Ok(data) => data,
            Err(e) => {
                self.finish(Err(SendMessageError::encoding(e)));
                return;
            }
        };

        let remaining = self.background.background_time_remaining();
        if remaining != UNLIMITED_BACKGROUND_TIME && remaining <= self.timeout {
            self.finish(Err(SendMessageError::not_enough_background_time(
                remaining,
                self.timeout,
            )));
            return;
        }

        let events = self.events.downgrade();
        let reply_handler: ReplyHandler = Box::new(move |response: Option<Vec<u8>>| {
            if let Some(events) = events.upgrade() {
                let _ = events.send(OperationEvent::Reply(response));
            }
        });

        debug!("[{}] Submitting {} bytes", self.id, data.len());

        if let Err(e) = self.tunnel.send_provider_message(data, reply_handler) {
            self.finish(Err(SendMessageError::system(e)));
        }
    }

    fn finish(&mut self, result: Result<O, SendMessageError>) {
        if self.completion.is_finished() {
            return;
        }

        self.remove_status_observer();
        self.timers.cancel_all();
        self.end_background_task();

        let state = match &result {
            Ok(_) => OperationState::Completed,
            Err(SendMessageError::Cancelled { .. }) => OperationState::Cancelled,
            Err(_) => OperationState::Failed,
        };

        match &result {
            Ok(_) => info!("[{}] Operation completed", self.id),
            Err(e) => warn!("[{}] Operation failed ({}): {e}", self.id, e.kind()),
        }

        self.set_state(state);
        self.completion.complete(result);
    }

    fn remove_status_observer(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.invalidate();
        }
    }

    fn begin_background_task(&mut self) {
        let events = self.events.downgrade();
        let name = format!("Send tunnel provider message: {}", self.message);

        self.background_task = self.background.begin_background_task(
            &name,
            Box::new(move || {
                if let Some(events) = events.upgrade() {
                    let _ = events.send(OperationEvent::BackgroundTaskExpired);
                }
            }),
        );
    }

    fn end_background_task(&mut self) {
        if let Some(id) = self.background_task.take() {
            self.background.end_background_task(id);
        }
    }

    fn set_state(&self, state: OperationState) {
        trace!("[{}] State -> {state}", self.id);
        self.state.send_replace(state);
    }
}

impl<M, O> Drop for OperationActor<M, O> {
    fn drop(&mut self) {
        if let Some(id) = self.background_task.take() {
            self.background.end_background_task(id);
        }
    }
}
