use tunnel_core::codec::{decode_json, require_response};
use tunnel_core::error::DecodeError;

use std::error::Error;

/// **VALUE**: The empty-response failure keeps its familiar wording.
#[test]
fn given_absent_reply_when_required_then_error_reads_unexpected_empty_response() {
    // GIVEN
    let response = None;

    // WHEN
    let err = require_response(response).unwrap_err();

    // THEN
    assert!(matches!(err, DecodeError::EmptyResponse { .. }));
    assert!(
        err.to_string()
            .contains("Unexpected empty (nil) response from the tunnel.")
    );
    assert!(err.source().is_none());
}

#[test]
fn given_malformed_json_when_decoded_then_serde_error_is_the_source() {
    // GIVEN
    let response = Some(b"{\"bytes\":".to_vec());

    // WHEN
    let err = decode_json::<serde_json::Value>(response).unwrap_err();

    // THEN
    assert!(matches!(err, DecodeError::Json { .. }));
    assert!(err.to_string().starts_with("Json Decode Error: "));
    assert!(err.source().is_some());
}

#[test]
fn given_custom_decode_error_then_message_and_location_are_rendered() {
    // GIVEN
    let err = DecodeError::custom("unexpected reply tag 7");

    // WHEN
    let error_string = err.to_string();

    // THEN
    assert!(error_string.contains("Decode Error: unexpected reply tag 7"));
    assert!(error_string.contains("codec.rs"));
}
