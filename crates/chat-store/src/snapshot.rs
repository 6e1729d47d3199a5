//! Read-only view of the session state

use chat_core::{Chat, ChatId, Message, MessageId, PresenceEntry, User, UserId, UserStatus};
use std::collections::HashMap;

/// Point-in-time copy of the session state handed to observers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub chats: Vec<Chat>,
    pub users: Vec<User>,
    pub active_chat_id: Option<ChatId>,
    /// Messages of the active chat, in timeline order
    pub messages: Vec<Message>,
    pub presence: HashMap<UserId, PresenceEntry>,
    /// User-visible error line
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn chat(&self, chat_id: ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id.and_then(|id| self.chat(id))
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn user(&self, user_id: UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn status_of(&self, user_id: UserId) -> UserStatus {
        self.presence
            .get(&user_id)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// Provisional messages still waiting for their echo
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.pending).count()
    }

    pub fn failed_count(&self) -> usize {
        self.messages.iter().filter(|m| m.failed).count()
    }

    /// Check if nothing is loaded
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
            && self.users.is_empty()
            && self.active_chat_id.is_none()
            && self.messages.is_empty()
            && self.presence.is_empty()
    }
}
