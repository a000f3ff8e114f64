use common::ErrorLocation;

use tunnel_core::error::{CoreError, SendMessageError};

use thiserror::Error;

/// Errors reported by the probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Error from this app (logger setup, argument handling)
    #[error("Probe Error: {message} {location}")]
    Probe {
        message: String,
        location: ErrorLocation,
    },

    /// Error from tunnel-core (config loading and validation)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The operation itself failed
    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
        #[source]
        source: SendMessageError,
    },
}
