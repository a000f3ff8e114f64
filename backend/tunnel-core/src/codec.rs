//! Message encoding and reply decoding helpers.
//!
//! Payloads are opaque to the operation: a [`TunnelMessage`] turns itself into
//! bytes and a caller-supplied decoder turns the reply back into a value.

use crate::error::codec::{DecodeError, EncodeError};

use common::ErrorLocation;

use std::fmt::{self, Display};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A message that can be submitted to the tunnel process.
///
/// `Display` names the message in logs and background task names.
pub trait TunnelMessage: Display + Send + 'static {
    fn encode(&self) -> Result<Vec<u8>, EncodeError>;
}

/// Message whose payload is already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    name: String,
    payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

impl Display for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl TunnelMessage for RawMessage {
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.payload.clone())
    }
}

/// Message serialised to JSON when sent.
#[derive(Debug, Clone)]
pub struct JsonMessage<T> {
    name: String,
    body: T,
}

impl<T> JsonMessage<T> {
    pub fn new(name: impl Into<String>, body: T) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

impl<T> Display for JsonMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl<T: Serialize + Send + 'static> TunnelMessage for JsonMessage<T> {
    #[track_caller]
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(&self.body).map_err(|e| EncodeError::Json {
            message: format!("Failed to serialize {}: {e}", self.name),
            location: ErrorLocation::caller(),
            source: e,
        })
    }
}

/// Fail with [`DecodeError::EmptyResponse`] when the tunnel replied without a payload.
#[track_caller]
pub fn require_response(response: Option<Vec<u8>>) -> Result<Vec<u8>, DecodeError> {
    match response {
        Some(data) => Ok(data),
        None => Err(DecodeError::empty_response()),
    }
}

/// Decoder for messages whose reply carries no information.
pub fn ignore_response(_response: Option<Vec<u8>>) -> Result<(), DecodeError> {
    Ok(())
}

#[track_caller]
pub fn decode_json<T: DeserializeOwned>(response: Option<Vec<u8>>) -> Result<T, DecodeError> {
    let data = require_response(response)?;
    serde_json::from_slice(&data).map_err(|e| DecodeError::Json {
        message: format!("Failed to parse tunnel response: {e}"),
        location: ErrorLocation::caller(),
        source: e,
    })
}

#[track_caller]
pub fn decode_utf8(response: Option<Vec<u8>>) -> Result<String, DecodeError> {
    let data = require_response(response)?;
    String::from_utf8(data).map_err(|e| DecodeError::Utf8 {
        message: format!("Tunnel response is not valid UTF-8: {e}"),
        location: ErrorLocation::caller(),
        source: e,
    })
}
