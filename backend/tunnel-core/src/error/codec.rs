use common::ErrorLocation;

use std::error::Error as StdError;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum EncodeError {
    #[error("Json Encode Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
        #[source]
        source: serde_json::Error,
    },

    #[error("Encode Error: {message} {location}")]
    Other {
        message: String,
        location: ErrorLocation,
    },
}

#[derive(Debug, ThisError)]
pub enum DecodeError {
    #[error("Empty Response Error: Unexpected empty (nil) response from the tunnel. {location}")]
    EmptyResponse { location: ErrorLocation },

    #[error("Json Decode Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
        #[source]
        source: serde_json::Error,
    },

    #[error("Utf8 Decode Error: {message} {location}")]
    Utf8 {
        message: String,
        location: ErrorLocation,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Escape hatch for decoders that parse replies with their own machinery.
    #[error("Decode Error: {message} {location}")]
    Custom {
        message: String,
        location: ErrorLocation,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl DecodeError {
    #[track_caller]
    pub fn empty_response() -> Self {
        DecodeError::EmptyResponse {
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn custom(message: impl Into<String>) -> Self {
        DecodeError::Custom {
            message: message.into(),
            location: ErrorLocation::caller(),
            source: None,
        }
    }
}
