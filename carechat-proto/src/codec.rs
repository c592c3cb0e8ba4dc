//! JSON serialization for the consultation chat wire shape.
//!
//! The consultation API speaks JSON over HTTP. Transport implementations
//! use these helpers so that every transport agrees on a single wire shape
//! for single messages (`send-message` responses) and message lists
//! (`fetch-messages` responses).

use crate::message::Message;

/// Error type for codec encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Encodes a single [`Message`] as a JSON object.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the message cannot be
/// serialized.
pub fn encode(message: &Message) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a single [`Message`] from a JSON object.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the JSON cannot be
/// deserialized.
pub fn decode(json: &str) -> Result<Message, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Encodes a message list as a JSON array, preserving order.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the list cannot be serialized.
pub fn encode_list(messages: &[Message]) -> Result<String, CodecError> {
    serde_json::to_string(messages).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a message list from a JSON array, preserving order.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the JSON cannot be
/// deserialized.
pub fn decode_list(json: &str) -> Result<Vec<Message>, CodecError> {
    serde_json::from_str(json).map_err(|e| CodecError::Serialization(e.to_string()))
}
