//! Presence - user online status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DomainError;
use crate::value_objects::{timestamp, UserId};

/// User online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserStatus {
    /// User is online and active
    Online,
    /// User is away from keyboard
    Away,
    /// User is offline
    #[default]
    Offline,
}

impl UserStatus {
    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }

    /// Check if this status should be shown as reachable
    #[must_use]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            _ => Err(DomainError::InvalidStatus(s.to_string())),
        }
    }
}

impl Serialize for UserStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Presence of one user
///
/// A user missing from the presence map counts as offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub status: UserStatus,
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceEntry {
    /// Create new presence data
    #[must_use]
    pub fn new(user_id: UserId, status: UserStatus, last_seen: Option<DateTime<Utc>>) -> Self {
        Self {
            user_id,
            status,
            last_seen,
        }
    }

    /// Presence of a user we have heard nothing about
    #[must_use]
    pub fn offline(user_id: UserId) -> Self {
        Self::new(user_id, UserStatus::Offline, None)
    }
}
