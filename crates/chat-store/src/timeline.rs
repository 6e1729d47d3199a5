//! Message timeline of the active chat
//!
//! Invariants held by every operation:
//! - no two entries share an id
//! - entries are sorted by `Message::timeline_cmp` (`created_at`, then id)
//! - a pending provisional entry is replaced by its echo, never duplicated

use chat_core::{DomainError, Message, MessageId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Result of merging an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New entry inserted in order
    Appended,
    /// Replaced the provisional entry with this id
    Reconciled(MessageId),
    /// An entry with the same id already exists
    Duplicate,
    /// The message belongs to a chat that is not active
    StaleChat,
}

impl MergeOutcome {
    /// Check if the timeline changed
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Appended | Self::Reconciled(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeline {
    messages: Vec<Message>,
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an authoritative message
    ///
    /// Dedup by id wins over echo matching: a message whose id is already
    /// present is always a no-op.
    pub fn merge(&mut self, message: Message, echo_window: Duration) -> MergeOutcome {
        if self.contains(message.id) {
            return MergeOutcome::Duplicate;
        }

        let echo_of = self
            .messages
            .iter()
            .position(|local| local.pending && message.is_echo_of(local, echo_window));

        let outcome = match echo_of {
            Some(index) => MergeOutcome::Reconciled(self.messages.remove(index).id),
            None => MergeOutcome::Appended,
        };

        self.insert_sorted(message);
        outcome
    }

    /// Add a locally created provisional message
    pub fn push_provisional(&mut self, message: Message) -> bool {
        if self.contains(message.id) {
            return false;
        }
        self.insert_sorted(message);
        true
    }

    /// Replace the timeline with fetched history
    ///
    /// Local entries missing from the fetch are carried over, except
    /// provisional entries whose echo the fetch already contains. Each fetched
    /// message can absorb at most one provisional entry.
    pub fn replace_with_history(&mut self, fetched: Vec<Message>, echo_window: Duration) {
        let mut seen = HashSet::with_capacity(fetched.len());
        let mut merged: Vec<Message> = fetched.into_iter().filter(|m| seen.insert(m.id)).collect();
        let fetched_len = merged.len();
        let mut claimed = vec![false; fetched_len];

        for local in std::mem::take(&mut self.messages) {
            if seen.contains(&local.id) {
                continue;
            }
            if local.is_provisional() {
                let echo = (0..fetched_len)
                    .find(|&i| !claimed[i] && merged[i].is_echo_of(&local, echo_window));
                if let Some(i) = echo {
                    claimed[i] = true;
                    continue;
                }
            }
            merged.push(local);
        }

        merged.sort_by(Message::timeline_cmp);
        self.messages = merged;
    }

    /// Flag a provisional message whose send failed
    pub fn mark_failed(&mut self, id: MessageId) -> bool {
        match self.get_mut(id) {
            Some(message) if message.is_provisional() => {
                message.pending = false;
                message.failed = true;
                true
            }
            _ => false,
        }
    }

    /// Put a failed message back in flight
    ///
    /// The entry is re-stamped with `now` so its echo falls inside the match
    /// window, and moves to its new position in the timeline.
    pub fn retry(&mut self, id: MessageId, now: DateTime<Utc>) -> Result<Message, DomainError> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == id)
            .ok_or(DomainError::MessageNotFound(id))?;

        if !self.messages[index].failed {
            return Err(DomainError::NotRetryable(id));
        }

        let mut message = self.messages.remove(index);
        message.failed = false;
        message.pending = true;
        message.created_at = now;
        self.insert_sorted(message.clone());
        Ok(message)
    }

    /// Flag every message not written by `reader` as read
    pub fn mark_read_except(&mut self, reader: UserId) -> usize {
        let mut count = 0;
        for message in self.messages.iter_mut().filter(|m| m.author_id != reader && !m.is_read) {
            message.is_read = true;
            count += 1;
        }
        count
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    fn insert_sorted(&mut self, message: Message) {
        let index = self
            .messages
            .partition_point(|m| m.timeline_cmp(&message) != Ordering::Greater);
        self.messages.insert(index, message);
    }
}
