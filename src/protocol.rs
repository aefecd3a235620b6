use crate::chat::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a send, over the live channel or `POST /messages`.
///
/// Fields stay raw here, and a missing one reads as null. The relay
/// validates all three before anything is stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendMessageRequest {
    pub sender_id: Value,
    pub receiver_id: Value,
    pub content: Value,
}

/// Frames a client sends over its live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a user id
    RegisterUser(Value),

    SendMessage(SendMessageRequest),
}

/// Frames pushed to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A message this user sent or received was just persisted
    NewMessage(Message),

    /// A send issued on this connection failed
    MessageError { error: String },
}

impl ClientEvent {
    pub const SEND_MESSAGE: &'static str = "sendMessage";

    /// The `event` name of a frame that did not parse as a [`ClientEvent`].
    pub fn name_of(text: &str) -> Option<String> {
        let frame: Value = serde_json::from_str(text).ok()?;
        frame.get("event")?.as_str().map(str::to_string)
    }
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::MessageError { .. } => "messageError",
        }
    }
}
