//! Push endpoint addressing

use chat_common::Credential;
use chat_core::ChatId;
use std::fmt;

/// Push endpoint a connection is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Global presence and chat-list events
    Status,
    /// Message stream of one chat
    Chat(ChatId),
}

impl Endpoint {
    /// Path below the push base URL
    pub fn path(&self) -> String {
        match self {
            Self::Status => "/ws/status".to_string(),
            Self::Chat(chat_id) => format!("/ws/chat/{chat_id}"),
        }
    }

    /// Full URL with the credential as `token` query parameter
    ///
    /// The transport cannot carry custom headers, so the token travels in
    /// the query string.
    pub fn url(&self, base: &str, credential: &Credential) -> String {
        format!(
            "{}{}?token={}",
            base.trim_end_matches('/'),
            self.path(),
            urlencoding::encode(credential.expose())
        )
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Status => None,
            Self::Chat(chat_id) => Some(*chat_id),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status => f.write_str("status"),
            Self::Chat(chat_id) => write!(f, "chat/{chat_id}"),
        }
    }
}
