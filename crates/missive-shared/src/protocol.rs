//! JSON wire protocol spoken over the realtime socket.
//!
//! Every frame is a text envelope of the form `{"event": "...", "data": {...}}`.
//! Inbound `message` events carry loosely-shaped payloads (see
//! [`Message::from_value`]); outbound messages always use the flat canonical
//! shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::EVENT_MESSAGE;
use crate::types::{Message, MessageKind, UserId};

/// One frame on the wire, either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Outbound chat message payload.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub to: UserId,
    pub from: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// An inbound `message` event, normalized.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message: Message,
    /// Sender display name when the backend nested a user object.
    pub sender_label: Option<String>,
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Message(MessageEvent),
    /// An event this client does not handle (e.g. call signaling).
    Unknown { event: String },
}

/// Decode one inbound text frame.
///
/// Returns `Err` only for malformed envelopes; payloads that fail to
/// normalize (missing participants) also surface as `Unknown` so a bad
/// frame never tears down the connection.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(text)?;
    if envelope.event == EVENT_MESSAGE {
        if let Some(message) = Message::from_value(&envelope.data) {
            let sender_label = Message::sender_label(&envelope.data);
            return Ok(ServerEvent::Message(MessageEvent {
                message,
                sender_label,
            }));
        }
    }
    Ok(ServerEvent::Unknown {
        event: envelope.event,
    })
}

/// Encode an outbound chat message into a text frame.
pub fn encode_message(message: &OutgoingMessage) -> Result<String, serde_json::Error> {
    let envelope = Envelope {
        event: EVENT_MESSAGE.to_string(),
        data: serde_json::to_value(message)?,
    };
    serde_json::to_string(&envelope)
}
