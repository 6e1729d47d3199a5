//! Chat entity - a direct or group conversation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::Validate;

use crate::error::DomainError;
use crate::value_objects::{ChatId, UserId};

/// Chat entity
///
/// A chat always has at least one member; construction and decoding both
/// reject an empty member set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChatRecord")]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    #[serde(rename = "is_group_chat")]
    pub is_group: bool,
    pub member_ids: BTreeSet<UserId>,
}

impl Chat {
    /// Create a new Chat
    pub fn new(
        id: ChatId,
        name: impl Into<String>,
        is_group: bool,
        members: impl IntoIterator<Item = UserId>,
    ) -> Result<Self, DomainError> {
        let member_ids: BTreeSet<UserId> = members.into_iter().collect();
        if member_ids.is_empty() {
            return Err(DomainError::EmptyMembers(id));
        }

        Ok(Self {
            id,
            name: name.into(),
            is_group,
            member_ids,
        })
    }

    /// Check if a user belongs to this chat
    #[inline]
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.member_ids.contains(&user_id)
    }

    /// Number of members
    #[inline]
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    /// The other participant of a direct chat, seen from `me`
    pub fn peer_of(&self, me: UserId) -> Option<UserId> {
        if self.is_group {
            return None;
        }
        self.member_ids.iter().copied().find(|id| *id != me)
    }
}

/// Wire shape of a chat
///
/// List endpoints return `users: [{id, username, ..}]`, broadcasts may carry
/// `member_ids` instead.
#[derive(Debug, Deserialize)]
struct ChatRecord {
    id: ChatId,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "is_group")]
    is_group_chat: bool,
    #[serde(default)]
    member_ids: Option<Vec<UserId>>,
    #[serde(default)]
    users: Option<Vec<MemberRef>>,
}

#[derive(Debug, Deserialize)]
struct MemberRef {
    id: UserId,
}

impl TryFrom<ChatRecord> for Chat {
    type Error = DomainError;

    fn try_from(record: ChatRecord) -> Result<Self, Self::Error> {
        let members = match (record.member_ids, record.users) {
            (Some(ids), _) if !ids.is_empty() => ids,
            (_, Some(users)) => users.into_iter().map(|u| u.id).collect(),
            (Some(ids), None) => ids,
            (None, None) => Vec::new(),
        };
        Self::new(record.id, record.name, record.is_group_chat, members)
    }
}

/// Request body for creating a chat
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewChat {
    #[validate(length(min = 1, max = 100, message = "chat name must be 1-100 characters"))]
    pub name: String,

    #[serde(rename = "is_group_chat")]
    pub is_group: bool,

    #[serde(rename = "user_ids")]
    #[validate(length(min = 1, message = "a chat needs at least one member"))]
    pub member_ids: Vec<UserId>,
}

impl NewChat {
    /// Direct chat with a single peer
    pub fn direct(name: impl Into<String>, peer: UserId) -> Self {
        Self {
            name: name.into(),
            is_group: false,
            member_ids: vec![peer],
        }
    }

    /// Group chat with the given members
    pub fn group(name: impl Into<String>, members: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            name: name.into(),
            is_group: true,
            member_ids: members.into_iter().collect(),
        }
    }
}
