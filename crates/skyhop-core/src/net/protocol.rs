use serde::Deserialize;

use super::messages::{ClientMessage, MessageType, ServerMessage};

/// Maximum frame size in bytes. Larger frames are dropped unread.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    EmptyMessage,
    MissingType,
    UnknownMessageType(String),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::MissingType => write!(f, "message has no type field"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Only the discriminator; every other field is ignored.
#[derive(Deserialize)]
struct TypeProbe {
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn encode<T: serde::Serialize>(msg: &T) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(msg).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

/// Encode a `ClientMessage` to a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

/// Encode a `ServerMessage` to a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    encode(msg)
}

fn check_frame(data: &str) -> Result<(), ProtocolError> {
    if data.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    Ok(())
}

/// Peek at the `type` field of a frame without decoding the payload.
pub fn decode_message_type(data: &str) -> Result<MessageType, ProtocolError> {
    check_frame(data)?;
    let probe: TypeProbe =
        serde_json::from_str(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    let kind = probe.kind.ok_or(ProtocolError::MissingType)?;
    MessageType::from_tag(&kind).ok_or(ProtocolError::UnknownMessageType(kind))
}

/// Decode a JSON text frame into a `ClientMessage`.
pub fn decode_client_message(data: &str) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    if !msg_type.is_client_message() {
        return Err(ProtocolError::UnknownMessageType(msg_type.tag().to_string()));
    }
    serde_json::from_str(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a JSON text frame into a `ServerMessage`.
pub fn decode_server_message(data: &str) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    if !msg_type.is_server_message() {
        return Err(ProtocolError::UnknownMessageType(msg_type.tag().to_string()));
    }
    serde_json::from_str(data).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}
