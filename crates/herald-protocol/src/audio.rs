//! Audio payload encoding.
//!
//! Audio is carried inside JSON as a base64 data URI.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::codec::ProtocolError;

/// Prefix of every audio data URI produced by the server.
pub const AUDIO_DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

/// Encode raw audio bytes as a `data:audio/wav;base64,` URI.
#[must_use]
pub fn encode_data_uri(audio: &[u8]) -> String {
    let mut uri = String::with_capacity(AUDIO_DATA_URI_PREFIX.len() + audio.len().div_ceil(3) * 4);
    uri.push_str(AUDIO_DATA_URI_PREFIX);
    STANDARD.encode_string(audio, &mut uri);
    uri
}

/// Decode an audio data URI back to raw bytes.
///
/// Accepts a full data URI (any media type) or bare base64.
///
/// # Errors
///
/// Returns an error if the base64 portion is invalid.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, ProtocolError> {
    let encoded = match uri.split_once(',') {
        Some((_, data)) => data,
        None => uri,
    };
    Ok(STANDARD.decode(encoded.trim())?)
}
