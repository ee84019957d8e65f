//! Codec for encoding and decoding Herald frames.
//!
//! Push frames are framed as Server-Sent Events (`data: <json>\n\n`).
//! Socket messages are bare JSON text, one object per WebSocket message.

use thiserror::Error;

use crate::frames::{InboundMessage, OutboundMessage, PushFrame};

/// Default maximum size of an inbound message (64 KiB).
pub const MAX_INBOUND_SIZE: usize = 64 * 1024;

/// Field prefix of an SSE data line.
const SSE_DATA_PREFIX: &str = "data:";

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Inbound message exceeds the configured limit.
    #[error("Frame size {0} exceeds maximum {1}")]
    FrameTooLarge(usize, usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Audio data URI could not be decoded.
    #[error("Invalid audio payload: {0}")]
    Audio(#[from] base64::DecodeError),

    /// Invalid frame data.
    #[error("Invalid frame: {0}")]
    Invalid(String),
}

/// Encode a push frame as one SSE event.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_push(frame: &PushFrame) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(frame)?;

    let mut out = String::with_capacity(SSE_DATA_PREFIX.len() + json.len() + 3);
    out.push_str(SSE_DATA_PREFIX);
    out.push(' ');
    out.push_str(&json);
    out.push_str("\n\n");
    Ok(out)
}

/// Decode one SSE event produced by [`encode_push`].
///
/// # Errors
///
/// Returns an error if the `data:` field is missing or the JSON is invalid.
pub fn decode_push(event: &str) -> Result<PushFrame, ProtocolError> {
    let json = event
        .trim_end()
        .strip_prefix(SSE_DATA_PREFIX)
        .ok_or_else(|| ProtocolError::Invalid("missing data field".into()))?;

    Ok(serde_json::from_str(json.trim_start())?)
}

/// Encode a socket message as JSON text.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn encode_socket(message: &OutboundMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

/// Decode an inbound socket message using [`MAX_INBOUND_SIZE`].
///
/// # Errors
///
/// Returns an error if the text is too large, not JSON, or not a known message.
pub fn decode_inbound(text: &str) -> Result<InboundMessage, ProtocolError> {
    decode_inbound_limited(text, MAX_INBOUND_SIZE)
}

/// Decode an inbound socket message with an explicit size limit.
///
/// # Errors
///
/// Returns an error if the text is too large, not JSON, or not a known message.
pub fn decode_inbound_limited(text: &str, max_size: usize) -> Result<InboundMessage, ProtocolError> {
    if text.len() > max_size {
        return Err(ProtocolError::FrameTooLarge(text.len(), max_size));
    }

    Ok(serde_json::from_str(text)?)
}
