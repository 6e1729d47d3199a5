//! Inbound frame classification
//!
//! Status-channel frames carry no guaranteed type tag. When the backend does
//! send `type`, it decides the category; otherwise the shape does:
//!
//! | shape                               | category        |
//! |-------------------------------------|-----------------|
//! | `user_id` and `status`              | status update   |
//! | `action` starting with `chat.`      | chat mutation   |
//! | anything else                       | unknown         |
//!
//! Classification is total. A frame that picks a category but then fails to
//! decode lands in `Unknown`; nothing is half-applied.

use chat_core::{Chat, ChatId, Message, PresenceEntry};
use serde_json::Value;

use super::actions::ChatAction;

const TYPE_STATUS: &str = "status";
const TYPE_CHAT: &str = "chat";

/// Chat-list mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMutation {
    Created(Chat),
    Updated(Chat),
    Deleted(ChatId),
}

impl ChatMutation {
    pub fn action(&self) -> ChatAction {
        match self {
            Self::Created(_) => ChatAction::Created,
            Self::Updated(_) => ChatAction::Updated,
            Self::Deleted(_) => ChatAction::Deleted,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Created(chat) | Self::Updated(chat) => chat.id,
            Self::Deleted(chat_id) => *chat_id,
        }
    }
}

/// A classified status-channel frame
#[derive(Debug, Clone, PartialEq)]
pub enum PresenceFrame {
    Status(PresenceEntry),
    Chat(ChatMutation),
    Unknown(Value),
}

impl PresenceFrame {
    /// Classify a decoded status-channel frame
    pub fn classify(value: Value) -> Self {
        let decoded = match value.get("type").and_then(Value::as_str) {
            Some(TYPE_STATUS) => decode_status(&value).map(Self::Status),
            Some(TYPE_CHAT) => decode_chat(&value).map(Self::Chat),
            _ if looks_like_status(&value) => decode_status(&value).map(Self::Status),
            _ if looks_like_chat(&value) => decode_chat(&value).map(Self::Chat),
            _ => None,
        };

        decoded.unwrap_or(Self::Unknown(value))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

/// Server-side error text carried by an `{"error": ..}` frame
pub fn server_error(value: &Value) -> Option<&str> {
    value.get("error").and_then(Value::as_str)
}

/// Decode a chat-channel frame as a full message record
pub fn decode_message(value: &Value) -> Result<Message, serde_json::Error> {
    serde_json::from_value(value.clone())
}

fn looks_like_status(value: &Value) -> bool {
    value.get("user_id").is_some() && value.get("status").is_some()
}

fn looks_like_chat(value: &Value) -> bool {
    value
        .get("action")
        .and_then(Value::as_str)
        .is_some_and(ChatAction::is_chat_action)
}

fn decode_status(value: &Value) -> Option<PresenceEntry> {
    serde_json::from_value(value.clone())
        .map_err(|e| tracing::debug!(error = %e, "Status frame did not decode"))
        .ok()
}

fn decode_chat(value: &Value) -> Option<ChatMutation> {
    let action = value
        .get("action")
        .and_then(Value::as_str)
        .and_then(ChatAction::from_str)?;

    match action {
        ChatAction::Created => decode_chat_body(value).map(ChatMutation::Created),
        ChatAction::Updated => decode_chat_body(value).map(ChatMutation::Updated),
        ChatAction::Deleted => value
            .get("chat_id")
            .or_else(|| value.get("chat").and_then(|c| c.get("id")))
            .and_then(|id| serde_json::from_value(id.clone()).ok())
            .map(ChatMutation::Deleted),
    }
}

fn decode_chat_body(value: &Value) -> Option<Chat> {
    let body = value.get("chat")?;
    serde_json::from_value(body.clone())
        .map_err(|e| tracing::debug!(error = %e, "Chat payload did not decode"))
        .ok()
}
