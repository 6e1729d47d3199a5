//! User entity - a member of the chat service as seen by the client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{timestamp, UserId};

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    /// Create a new User
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            last_seen: None,
        }
    }

    /// Display tag (`@username`)
    pub fn tag(&self) -> String {
        format!("@{}", self.username)
    }
}
