use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Failures raised synchronously by a [`Tunnel`](crate::tunnel::Tunnel) when
/// a provider message cannot be submitted.
#[derive(Debug, ThisError)]
pub enum TunnelError {
    #[error("Not Connected Error: {message} {location}")]
    NotConnected {
        message: String,
        location: ErrorLocation,
    },

    #[error("Submit Error: {message} {location}")]
    Submit {
        message: String,
        location: ErrorLocation,
    },
}
