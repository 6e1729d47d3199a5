//! Entity identifiers
//!
//! The backend issues plain integer ids. Each entity gets its own newtype so a
//! chat id can never be passed where a user id is expected.
//!
//! Message ids have one extra rule: negative values are provisional ids minted
//! locally for optimistic sends and are never issued by the server.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Error when parsing an id from its string form
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid id format")]
    InvalidFormat,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(i64);

        impl $name {
            /// Create an id from a raw value
            #[inline]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the inner value
            #[inline]
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Parse from string representation
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| IdParseError::InvalidFormat)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_i64(self.0)
            }
        }

        // Accept both numbers and numeric strings
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(IdVisitor($label)).map(Self)
            }
        }
    };
}

struct IdVisitor(&'static str);

impl serde::de::Visitor<'_> for IdVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a string or integer representing a {} id", self.0)
    }

    fn visit_i64<E>(self, value: i64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        i64::try_from(value).map_err(|_| E::custom(format!("{} id out of range", self.0)))
    }

    fn visit_str<E>(self, value: &str) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| E::custom(format!("invalid {} id string", self.0)))
    }
}

entity_id!(
    /// Chat identifier
    ChatId,
    "chat"
);

entity_id!(
    /// User identifier
    UserId,
    "user"
);

entity_id!(
    /// Message identifier
    MessageId,
    "message"
);

impl MessageId {
    /// Whether this id was minted locally for a not-yet-acknowledged message
    #[inline]
    pub const fn is_provisional(self) -> bool {
        self.0 < 0
    }
}

/// Generator for provisional message ids
///
/// Counts down from -1 so provisional ids never collide with server ids.
#[derive(Debug)]
pub struct ProvisionalIdGenerator {
    next: AtomicI64,
}

impl ProvisionalIdGenerator {
    /// Create a new generator
    pub const fn new() -> Self {
        Self {
            next: AtomicI64::new(-1),
        }
    }

    /// Mint the next provisional id
    pub fn generate(&self) -> MessageId {
        MessageId(self.next.fetch_sub(1, Ordering::Relaxed))
    }
}

impl Default for ProvisionalIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
