//! Ordered chat list
//!
//! Chats keep their arrival order. Ids are unique within the list.

use chat_core::{Chat, ChatId};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatList {
    chats: Vec<Chat>,
}

impl ChatList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list, keeping the first occurrence of each id
    pub fn replace(&mut self, chats: Vec<Chat>) {
        let mut seen = HashSet::with_capacity(chats.len());
        self.chats = chats.into_iter().filter(|c| seen.insert(c.id)).collect();
    }

    /// Append a chat unless one with the same id is already present
    ///
    /// Returns `true` if the chat was inserted.
    pub fn insert(&mut self, chat: Chat) -> bool {
        if self.contains(chat.id) {
            return false;
        }
        self.chats.push(chat);
        true
    }

    /// Replace the stored chat with the same id
    ///
    /// Returns `false` (and stores nothing) when the id is unknown.
    pub fn update(&mut self, chat: Chat) -> bool {
        match self.chats.iter_mut().find(|c| c.id == chat.id) {
            Some(slot) => {
                *slot = chat;
                true
            }
            None => false,
        }
    }

    /// Remove a chat by id
    pub fn remove(&mut self, chat_id: ChatId) -> Option<Chat> {
        let index = self.chats.iter().position(|c| c.id == chat_id)?;
        Some(self.chats.remove(index))
    }

    pub fn get(&self, chat_id: ChatId) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.get(chat_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn clear(&mut self) {
        self.chats.clear();
    }

    pub fn as_slice(&self) -> &[Chat] {
        &self.chats
    }
}
