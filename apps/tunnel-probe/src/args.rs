//! Command-line arguments.

use tunnel_core::TunnelStatus;
use tunnel_core::tunnel::ReplyBehavior;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;

/// Reason given by the loopback tunnel when `--reply reject` is used.
pub const REJECT_REASON: &str = "rejected by tunnel-probe";

#[derive(Debug, Parser)]
#[command(
    name = "tunnel-probe",
    about = "Send one provider message to an in-process loopback tunnel and print the reply"
)]
pub struct ProbeArgs {
    /// Tunnel status when the probe starts
    #[arg(long, value_enum, default_value_t = StatusArg::Connected)]
    pub status: StatusArg,

    /// How long ago the tunnel was launched (e.g. "3s")
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    pub launched_ago: Duration,

    /// Scripted status change `<status>@<delay>`, e.g. "connected@2s". Repeatable.
    #[arg(long = "transition", value_parser = parse_transition)]
    pub transitions: Vec<Transition>,

    /// Overrides the configured operation timeout
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Remaining background execution time. Unlimited when omitted.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub background_budget: Option<Duration>,

    /// How the loopback tunnel answers
    #[arg(long, value_enum, default_value_t = ReplyMode::Echo)]
    pub reply: ReplyMode,

    /// Latency before the loopback tunnel answers
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    pub reply_delay: Duration,

    /// Message text sent to the tunnel
    #[arg(long, default_value = "ping")]
    pub message: String,

    /// Directory holding tunnel-ipc.json. Defaults are used when omitted.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Directory for tunnel-probe.log. Logs go to stdout only when omitted.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log everything, including timer and state transitions
    #[arg(short, long)]
    pub verbose: bool,
}

impl ProbeArgs {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Trace
        } else if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Invalid,
    Disconnected,
    Connecting,
    Connected,
    Reasserting,
    Disconnecting,
}

impl From<StatusArg> for TunnelStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Invalid => TunnelStatus::Invalid,
            StatusArg::Disconnected => TunnelStatus::Disconnected,
            StatusArg::Connecting => TunnelStatus::Connecting,
            StatusArg::Connected => TunnelStatus::Connected,
            StatusArg::Reasserting => TunnelStatus::Reasserting,
            StatusArg::Disconnecting => TunnelStatus::Disconnecting,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReplyMode {
    /// Answer with the message itself
    Echo,
    /// Answer without a payload
    Empty,
    /// Never answer
    Silent,
    /// Refuse the submission
    Reject,
}

impl ReplyMode {
    pub fn behavior(self) -> ReplyBehavior {
        match self {
            ReplyMode::Echo => ReplyBehavior::Echo,
            ReplyMode::Empty => ReplyBehavior::Respond(None),
            ReplyMode::Silent => ReplyBehavior::NoReply,
            ReplyMode::Reject => ReplyBehavior::Reject(REJECT_REASON.to_string()),
        }
    }
}

/// Status change applied to the loopback tunnel `after` the probe starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: TunnelStatus,
    pub after: Duration,
}

/// Parse `<status>@<delay>`.
///
/// The status is a name (`connected`) or a raw numeric value, which allows
/// scripting statuses the tunnel does not know about.
pub fn parse_transition(value: &str) -> Result<Transition, String> {
    let (status, after) = value
        .split_once('@')
        .ok_or_else(|| format!("expected <status>@<delay>, got '{value}'"))?;

    let status = match status.trim().parse::<i32>() {
        Ok(raw) => TunnelStatus::from(raw),
        Err(_) => StatusArg::from_str(status.trim(), true)?.into(),
    };

    let after = humantime::parse_duration(after.trim())
        .map_err(|e| format!("invalid delay '{after}': {e}"))?;

    Ok(Transition { status, after })
}
