//! Session store
//!
//! Single source of truth for the client state. Only the synchronizer
//! mutates it; everything else reads snapshots, either on demand or through
//! the watch channel returned by [`SessionStore::subscribe`].

use chat_core::{Chat, ChatId, DomainError, Message, MessageId, PresenceEntry, User, UserId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tokio::sync::watch;

use crate::chat_list::ChatList;
use crate::presence::PresenceMap;
use crate::snapshot::SessionSnapshot;
use crate::timeline::{MergeOutcome, Timeline};

/// Default distance allowed between a provisional message and its echo
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(30);

/// What `remove_chat` found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChatRemoval {
    /// The chat was in the list
    pub removed: bool,
    /// The chat was the active one; active state has been cleared
    pub was_active: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    chats: ChatList,
    users: Vec<User>,
    active_chat_id: Option<ChatId>,
    timeline: Timeline,
    presence: PresenceMap,
    last_error: Option<String>,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            chats: self.chats.as_slice().to_vec(),
            users: self.users.clone(),
            active_chat_id: self.active_chat_id,
            messages: self.timeline.as_slice().to_vec(),
            presence: self.presence.to_map(),
            last_error: self.last_error.clone(),
        }
    }

    fn is_active(&self, chat_id: ChatId) -> bool {
        self.active_chat_id == Some(chat_id)
    }
}

/// In-memory session state with change notification
pub struct SessionStore {
    state: RwLock<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
    echo_window: chrono::Duration,
}

impl SessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new(echo_window: Duration) -> Self {
        let (updates, _) = watch::channel(SessionSnapshot::default());
        Self {
            state: RwLock::new(SessionState::default()),
            updates,
            echo_window: chrono::Duration::from_std(echo_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().snapshot()
    }

    /// Receive a fresh snapshot after every change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    pub fn active_chat_id(&self) -> Option<ChatId> {
        self.state.read().active_chat_id
    }

    pub fn contains_chat(&self, chat_id: ChatId) -> bool {
        self.state.read().chats.contains(chat_id)
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.state.read().timeline.get(id).cloned()
    }

    /// Run `f` under the write lock and publish when it reports a change
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> (R, bool)) -> R {
        let mut state = self.state.write();
        let (result, changed) = f(&mut state);
        if changed {
            self.updates.send_replace(state.snapshot());
        }
        result
    }

    // ------------------------------------------------------------------
    // Chat list
    // ------------------------------------------------------------------

    /// Replace the chat list with the authoritative one
    ///
    /// If the active chat is gone from the new list, active state is cleared
    /// and its id is returned.
    pub fn replace_chats(&self, chats: Vec<Chat>) -> Option<ChatId> {
        self.mutate(|state| {
            state.chats.replace(chats);
            let dropped = state.active_chat_id.filter(|active| !state.chats.contains(*active));
            if let Some(active) = dropped {
                tracing::debug!(chat_id = %active, "Active chat missing from chat list");
                state.active_chat_id = None;
                state.timeline.clear();
            }
            (dropped, true)
        })
    }

    /// Insert a chat unless its id is already present
    pub fn insert_chat(&self, chat: Chat) -> bool {
        self.mutate(|state| {
            let inserted = state.chats.insert(chat);
            (inserted, inserted)
        })
    }

    /// Fully replace an existing chat; unknown ids are ignored
    pub fn update_chat(&self, chat: Chat) -> bool {
        self.mutate(|state| {
            let updated = state.chats.update(chat);
            (updated, updated)
        })
    }

    /// Remove a chat; clears active state if it was the active chat
    pub fn remove_chat(&self, chat_id: ChatId) -> ChatRemoval {
        self.mutate(|state| {
            let removed = state.chats.remove(chat_id).is_some();
            let was_active = state.is_active(chat_id);
            if was_active {
                state.active_chat_id = None;
                state.timeline.clear();
            }
            let outcome = ChatRemoval {
                removed,
                was_active,
            };
            (outcome, removed || was_active)
        })
    }

    // ------------------------------------------------------------------
    // Active chat and timeline
    // ------------------------------------------------------------------

    /// Switch the active chat; the message list always starts empty
    pub fn set_active_chat(&self, chat_id: Option<ChatId>) {
        self.mutate(|state| {
            state.active_chat_id = chat_id;
            state.timeline.clear();
            ((), true)
        });
    }

    /// Install fetched history if `chat_id` is still the active chat
    ///
    /// Returns `false` when the fetch is stale and nothing was touched.
    pub fn replace_history(&self, chat_id: ChatId, messages: Vec<Message>) -> bool {
        let window = self.echo_window;
        self.mutate(|state| {
            if !state.is_active(chat_id) {
                return (false, false);
            }
            let fetched: Vec<Message> =
                messages.into_iter().filter(|m| m.chat_id == chat_id).collect();
            state.timeline.replace_with_history(fetched, window);
            (true, true)
        })
    }

    /// Merge an authoritative message pushed on the chat channel
    pub fn merge_message(&self, message: Message) -> MergeOutcome {
        let window = self.echo_window;
        self.mutate(|state| {
            if !state.is_active(message.chat_id) {
                return (MergeOutcome::StaleChat, false);
            }
            let outcome = state.timeline.merge(message, window);
            (outcome, outcome.changed())
        })
    }

    /// Add a provisional message to the active chat
    pub fn push_provisional(&self, message: Message) -> bool {
        self.mutate(|state| {
            if !state.is_active(message.chat_id) {
                return (false, false);
            }
            let pushed = state.timeline.push_provisional(message);
            (pushed, pushed)
        })
    }

    /// Flag a provisional message as failed
    pub fn mark_failed(&self, id: MessageId) -> bool {
        self.mutate(|state| {
            let marked = state.timeline.mark_failed(id);
            (marked, marked)
        })
    }

    /// Put a failed message back to pending and return it
    pub fn retry_message(&self, id: MessageId, now: DateTime<Utc>) -> Result<Message, DomainError> {
        self.mutate(|state| match state.timeline.retry(id, now) {
            Ok(message) => (Ok(message), true),
            Err(e) => (Err(e), false),
        })
    }

    /// Flag messages of `chat_id` not written by `reader` as read
    pub fn mark_read_except(&self, chat_id: ChatId, reader: UserId) -> usize {
        self.mutate(|state| {
            if !state.is_active(chat_id) {
                return (0, false);
            }
            let count = state.timeline.mark_read_except(reader);
            (count, count > 0)
        })
    }

    // ------------------------------------------------------------------
    // Presence, roster, errors
    // ------------------------------------------------------------------

    /// Overwrite the presence entry of a user
    pub fn upsert_presence(&self, entry: PresenceEntry) {
        self.mutate(|state| {
            let changed = state.presence.upsert(entry);
            ((), changed)
        });
    }

    pub fn set_users(&self, users: Vec<User>) {
        self.mutate(|state| {
            state.users = users;
            ((), true)
        });
    }

    /// Set the user-visible error line
    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.mutate(|state| {
            state.last_error = Some(message);
            ((), true)
        });
    }

    pub fn dismiss_error(&self) {
        self.mutate(|state| {
            let had_error = state.last_error.take().is_some();
            ((), had_error)
        });
    }

    /// Drop everything
    pub fn clear(&self) {
        self.mutate(|state| {
            *state = SessionState::default();
            ((), true)
        });
        tracing::debug!("Session store cleared");
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW)
    }
}
