use crate::error::codec::{DecodeError, EncodeError};
use crate::error::tunnel::TunnelError;
use crate::tunnel::TunnelStatus;

use common::ErrorLocation;

use std::time::Duration;

use thiserror::Error as ThisError;

/// Terminal failure of a send-message operation.
///
/// Exactly one of these (or a decoded reply) is reported per operation.
#[derive(Debug, ThisError)]
pub enum SendMessageError {
    /// Tunnel process is either down or about to go down.
    #[error(
        "Tunnel Down Error: Tunnel is either down or about to go down (status: {status}). {location}"
    )]
    TunnelDown {
        status: TunnelStatus,
        location: ErrorLocation,
    },

    #[error("Timeout Error: Send timeout. {location}")]
    Timeout { location: ErrorLocation },

    /// Not enough background time to accommodate the operation.
    #[error(
        "Background Time Error: Not enough background time to accommodate the operation (remaining {remaining:?}, timeout {timeout:?}). {location}"
    )]
    NotEnoughBackgroundTime {
        remaining: Duration,
        timeout: Duration,
        location: ErrorLocation,
    },

    #[error("Encoding Error: {message} {location}")]
    Encoding {
        message: String,
        location: ErrorLocation,
        #[source]
        source: EncodeError,
    },

    #[error("System Error: {message} {location}")]
    System {
        message: String,
        location: ErrorLocation,
        #[source]
        source: TunnelError,
    },

    #[error("Decoding Error: {message} {location}")]
    Decoding {
        message: String,
        location: ErrorLocation,
        #[source]
        source: DecodeError,
    },

    #[error("Cancelled Error: Operation was cancelled. {location}")]
    Cancelled { location: ErrorLocation },
}

impl SendMessageError {
    #[track_caller]
    pub(crate) fn tunnel_down(status: TunnelStatus) -> Self {
        SendMessageError::TunnelDown {
            status,
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn timeout() -> Self {
        SendMessageError::Timeout {
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn not_enough_background_time(remaining: Duration, timeout: Duration) -> Self {
        SendMessageError::NotEnoughBackgroundTime {
            remaining,
            timeout,
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub(crate) fn encoding(source: EncodeError) -> Self {
        SendMessageError::Encoding {
            message: format!("Failed to encode tunnel message: {source}"),
            location: ErrorLocation::caller(),
            source,
        }
    }

    #[track_caller]
    pub(crate) fn system(source: TunnelError) -> Self {
        SendMessageError::System {
            message: format!("System error: {source}"),
            location: ErrorLocation::caller(),
            source,
        }
    }

    #[track_caller]
    pub(crate) fn decoding(source: DecodeError) -> Self {
        SendMessageError::Decoding {
            message: format!("Failed to decode tunnel response: {source}"),
            location: ErrorLocation::caller(),
            source,
        }
    }

    #[track_caller]
    pub(crate) fn cancelled() -> Self {
        SendMessageError::Cancelled {
            location: ErrorLocation::caller(),
        }
    }

    /// Short, stable name of the failure kind (used in logs).
    pub fn kind(&self) -> &'static str {
        match self {
            SendMessageError::TunnelDown { .. } => "tunnel_down",
            SendMessageError::Timeout { .. } => "timeout",
            SendMessageError::NotEnoughBackgroundTime { .. } => "not_enough_background_time",
            SendMessageError::Encoding { .. } => "encoding",
            SendMessageError::System { .. } => "system",
            SendMessageError::Decoding { .. } => "decoding",
            SendMessageError::Cancelled { .. } => "cancelled",
        }
    }
}
