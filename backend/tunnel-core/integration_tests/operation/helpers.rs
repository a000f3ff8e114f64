//! Test helpers for send-message operation tests.
//!
//! All operation tests run with paused tokio time; these helpers move the
//! clock and let spawned tasks (timers, actor, replies) catch up.

use tunnel_core::background::{BackgroundTaskProvider, ForegroundTaskProvider};
use tunnel_core::codec::{RawMessage, TunnelMessage, decode_utf8};
use tunnel_core::error::{EncodeError, SendMessageError};
use tunnel_core::operation::OperationHandle;
use tunnel_core::{LoopbackTunnel, SendTunnelMessageOperation};

use common::ErrorLocation;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PING: &[u8] = b"ping";

pub fn ping() -> RawMessage {
    RawMessage::new("ping", PING.to_vec())
}

/// Let every ready task run without moving the clock.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// Move the paused clock forward by `duration`, then settle.
pub async fn advance(duration: Duration) {
    tokio::time::advance(duration).await;
    settle().await;
}

/// Counts completion handler calls and remembers the last outcome kind.
#[derive(Clone, Default)]
pub struct CompletionRecorder {
    calls: Arc<AtomicUsize>,
    last_kind: Arc<Mutex<Option<String>>>,
}

impl CompletionRecorder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_kind(&self) -> Option<String> {
        self.last_kind.lock().unwrap().clone()
    }

    pub fn handler<O: 'static>(&self) -> impl FnOnce(&Result<O, SendMessageError>) + Send + 'static {
        let calls = Arc::clone(&self.calls);
        let last_kind = Arc::clone(&self.last_kind);
        move |result: &Result<O, SendMessageError>| {
            calls.fetch_add(1, Ordering::SeqCst);
            let kind = match result {
                Ok(_) => String::from("ok"),
                Err(e) => e.kind().to_string(),
            };
            *last_kind.lock().unwrap() = Some(kind);
        }
    }
}

/// Start a ping operation that decodes the reply as UTF-8.
pub fn start_ping(
    tunnel: &LoopbackTunnel,
    background: Arc<dyn BackgroundTaskProvider>,
    recorder: &CompletionRecorder,
) -> OperationHandle<String> {
    SendTunnelMessageOperation::new(Arc::new(tunnel.clone()), background, ping(), decode_utf8)
        .on_completion(recorder.handler())
        .start()
}

pub fn start_ping_in_foreground(
    tunnel: &LoopbackTunnel,
    recorder: &CompletionRecorder,
) -> OperationHandle<String> {
    start_ping(tunnel, Arc::new(ForegroundTaskProvider), recorder)
}

/// Message whose encoding always fails.
pub struct UnencodableMessage;

impl fmt::Display for UnencodableMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unencodable")
    }
}

impl TunnelMessage for UnencodableMessage {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Err(EncodeError::Other {
            message: String::from("payload too large"),
            location: ErrorLocation::caller(),
        })
    }
}
