//! Presence map

use chat_core::{PresenceEntry, UserId, UserStatus};
use std::collections::HashMap;

/// One presence entry per known user
///
/// Absence from the map means offline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceMap {
    entries: HashMap<UserId, PresenceEntry>,
}

impl PresenceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entry`, overwriting any previous entry for the user
    ///
    /// Nothing from the previous entry survives, `last_seen` included.
    /// Returns `true` if the stored value changed.
    pub fn upsert(&mut self, entry: PresenceEntry) -> bool {
        match self.entries.insert(entry.user_id, entry.clone()) {
            Some(previous) => previous != entry,
            None => true,
        }
    }

    pub fn get(&self, user_id: UserId) -> Option<&PresenceEntry> {
        self.entries.get(&user_id)
    }

    /// Status of a user, offline when unknown
    pub fn status_of(&self, user_id: UserId) -> UserStatus {
        self.get(user_id).map(|e| e.status).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn to_map(&self) -> HashMap<UserId, PresenceEntry> {
        self.entries.clone()
    }
}
