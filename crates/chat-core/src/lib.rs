//! # chat-core
//!
//! Domain layer containing entities, value objects, errors, and the
//! request/response collaborator trait.
//! This crate has zero dependencies on infrastructure (HTTP client, sockets, etc.).

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{Chat, Message, NewChat, PresenceEntry, User, UserStatus};
pub use error::{ApiError, ApiResult, DomainError};
pub use traits::ChatApi;
pub use value_objects::{ChatId, IdParseError, MessageId, ProvisionalIdGenerator, UserId};
