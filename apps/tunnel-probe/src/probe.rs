//! Drives one send-message operation against a scripted loopback tunnel.

use crate::args::ProbeArgs;
use crate::error::ProbeError;

use common::ErrorLocation;

use tunnel_core::codec::{RawMessage, decode_utf8};
use tunnel_core::error::{CoreError, SendMessageError};
use tunnel_core::{
    BackgroundTaskProvider, BudgetedTaskProvider, ForegroundTaskProvider, IpcConfig,
    LoopbackTunnel, SendTunnelMessageOperation, Tunnel,
};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Outcome of a successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub reply: String,
    /// Time from start until the reply was decoded.
    pub elapsed: Duration,
    /// Payloads the tunnel accepted.
    pub sent_messages: usize,
}

/// Resolve the operation settings: config file (if any), then CLI overrides.
///
/// # Errors
///
/// Returns [`ProbeError::Core`] if the file cannot be loaded or the
/// resulting settings are out of range.
pub fn resolve_config(args: &ProbeArgs) -> Result<IpcConfig, ProbeError> {
    let mut config = match &args.config_dir {
        Some(dir) => IpcConfig::load(dir).map_err(CoreError::from)?,
        None => IpcConfig::default(),
    };

    if let Some(timeout) = args.timeout {
        config.operation.timeout = timeout;
    }

    config.validate().map_err(CoreError::from)?;
    Ok(config)
}

/// Run the probe.
///
/// # Errors
///
/// Returns [`ProbeError::Send`] when the operation does not produce a reply.
pub async fn run(args: &ProbeArgs) -> Result<ProbeReport, ProbeError> {
    let config = resolve_config(args)?;

    let tunnel = LoopbackTunnel::launched(args.status.into(), args.launched_ago)
        .with_reply(args.reply.behavior())
        .with_reply_delay(args.reply_delay);

    let background: Arc<dyn BackgroundTaskProvider> = match args.background_budget {
        Some(budget) => Arc::new(BudgetedTaskProvider::new(budget)),
        None => Arc::new(ForegroundTaskProvider),
    };

    info!(
        "Probing loopback tunnel (status {}, launched {} ago)",
        tunnel.status(),
        humantime::format_duration(args.launched_ago)
    );

    let script = schedule_transitions(&tunnel, args);

    let started = Instant::now();
    let handle = SendTunnelMessageOperation::new(
        Arc::new(tunnel.clone()),
        background,
        RawMessage::new(args.message.clone(), args.message.clone().into_bytes()),
        decode_utf8,
    )
    .with_config(&config.operation)
    .on_completion(|result: &Result<String, SendMessageError>| {
        debug!("Completion handler called (success: {})", result.is_ok());
    })
    .start();

    let result = handle.result().await;
    let elapsed = started.elapsed();

    for task in script {
        task.abort();
    }

    let reply = result.map_err(|e| ProbeError::Send {
        message: format!(
            "'{}' failed after {}",
            args.message,
            humantime::format_duration(elapsed)
        ),
        location: ErrorLocation::from(Location::caller()),
        source: e,
    })?;

    Ok(ProbeReport {
        reply,
        elapsed,
        sent_messages: tunnel.sent_messages().len(),
    })
}

fn schedule_transitions(tunnel: &LoopbackTunnel, args: &ProbeArgs) -> Vec<JoinHandle<()>> {
    args.transitions
        .iter()
        .map(|transition| {
            let tunnel = tunnel.clone();
            let transition = *transition;
            tokio::spawn(async move {
                tokio::time::sleep(transition.after).await;
                info!(
                    "Scripted transition after {}: {}",
                    humantime::format_duration(transition.after),
                    transition.status
                );
                tunnel.set_status(transition.status);
            })
        })
        .collect()
}
