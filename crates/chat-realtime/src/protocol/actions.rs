//! Chat-list action names
//!
//! Carried in the `action` field of chat mutation frames on the status
//! channel.

use std::fmt;

/// Prefix shared by every chat-domain action
pub const CHAT_ACTION_PREFIX: &str = "chat.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatAction {
    /// A chat the user belongs to was created
    Created,
    /// A chat changed; the frame carries the full new chat
    Updated,
    /// A chat was deleted; the frame carries its id
    Deleted,
}

impl ChatAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "chat.created",
            Self::Updated => "chat.updated",
            Self::Deleted => "chat.deleted",
        }
    }

    /// Parse an action name
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chat.created" => Some(Self::Created),
            "chat.updated" => Some(Self::Updated),
            "chat.deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Check if an action name belongs to the chat domain
    #[must_use]
    pub fn is_chat_action(s: &str) -> bool {
        s.starts_with(CHAT_ACTION_PREFIX)
    }
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
