// Message codec: the compression envelope around a canonical message
//
// encode: canonical json -> zlib -> base64 -> {"payload": ...} -> canonical json
// decode: the same steps in reverse; every failure is an `EnvelopeError`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::canonical::{to_canonical_bytes, value_to_canonical_bytes, CanonicalError};
use super::types::Message;
use crate::wire::compress::{compress, decompress};

/// The single field of the outer wrapper
pub const PAYLOAD_FIELD: &str = "payload";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("canonical encoding failed: {0}")]
    Encode(#[from] CanonicalError),
    #[error("compression failed: {0}")]
    Compress(std::io::Error),
    #[error("outer wrapper is not valid JSON: {0}")]
    Wrapper(serde_json::Error),
    #[error("outer wrapper has no string \"payload\" field")]
    MissingPayload,
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("payload decompression failed: {0}")]
    Decompress(std::io::Error),
    #[error("inner message is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("inner message is not valid JSON: {0}")]
    Inner(serde_json::Error),
    #[error("inner message is not a JSON object")]
    NotAnObject,
    #[error("inner message does not match the message schema: {0}")]
    Schema(serde_json::Error),
}

/// Encode a message into envelope bytes (the frame payload).
pub fn encode(message: &Message) -> Result<Vec<u8>, EnvelopeError> {
    encode_value(message)
}

/// Encode any message-shaped value into envelope bytes.
pub fn encode_value<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, EnvelopeError> {
    let inner = to_canonical_bytes(message)?;
    let compressed = compress(&inner).map_err(EnvelopeError::Compress)?;

    let mut wrapper = Map::new();
    wrapper.insert(PAYLOAD_FIELD.to_string(), Value::String(STANDARD.encode(compressed)));
    Ok(value_to_canonical_bytes(Value::Object(wrapper))?)
}

/// Decode envelope bytes down to the inner JSON object, without imposing the
/// message schema. Use this when the checksum must cover fields this build
/// does not know about.
pub fn decode_value(bytes: &[u8]) -> Result<Value, EnvelopeError> {
    let wrapper: Value = serde_json::from_slice(bytes).map_err(EnvelopeError::Wrapper)?;
    let payload = wrapper
        .get(PAYLOAD_FIELD)
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingPayload)?;

    let compressed = STANDARD.decode(payload)?;
    let inner = decompress(&compressed).map_err(EnvelopeError::Decompress)?;
    let text = std::str::from_utf8(&inner)?;

    let value: Value = serde_json::from_str(text).map_err(EnvelopeError::Inner)?;
    if !value.is_object() {
        return Err(EnvelopeError::NotAnObject);
    }
    Ok(value)
}

/// Decode envelope bytes into a `Message`.
pub fn decode(bytes: &[u8]) -> Result<Message, EnvelopeError> {
    let value = decode_value(bytes)?;
    message_from_value(value)
}

/// Apply the message schema to an already-decoded inner value.
pub fn message_from_value(value: Value) -> Result<Message, EnvelopeError> {
    serde_json::from_value(value).map_err(EnvelopeError::Schema)
}
