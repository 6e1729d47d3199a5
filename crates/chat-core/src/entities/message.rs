//! Message entity - represents a chat message

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::value_objects::{timestamp, ChatId, MessageId, UserId};

/// Message entity
///
/// `pending` and `failed` are client-side delivery flags and never travel
/// over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    #[serde(rename = "user_id", alias = "author_id")]
    pub author_id: UserId,
    pub content: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(skip)]
    pub pending: bool,
    #[serde(skip)]
    pub failed: bool,
}

impl Message {
    /// Create an acknowledged message
    pub fn new(
        id: MessageId,
        chat_id: ChatId,
        author_id: UserId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            chat_id,
            author_id,
            content: content.into(),
            created_at,
            is_read: false,
            pending: false,
            failed: false,
        }
    }

    /// Create a provisional message for an optimistic send
    pub fn provisional(
        id: MessageId,
        chat_id: ChatId,
        author_id: UserId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pending: true,
            ..Self::new(id, chat_id, author_id, content, created_at)
        }
    }

    /// Whether this entry was created locally and not yet acknowledged
    #[inline]
    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }

    /// Timeline order: `created_at` ascending, ties broken by id ascending
    pub fn timeline_cmp(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Check if `self` is the server echo of the provisional `local` entry
    ///
    /// Same chat, same author, same content, and timestamps no further apart
    /// than `window`.
    pub fn is_echo_of(&self, local: &Self, window: Duration) -> bool {
        local.is_provisional()
            && !self.is_provisional()
            && self.chat_id == local.chat_id
            && self.author_id == local.author_id
            && self.content == local.content
            && (self.created_at - local.created_at).abs() <= window
    }

    /// Check if message content is empty
    #[inline]
    pub fn is_blank(content: &str) -> bool {
        content.trim().is_empty()
    }
}
