//! Value objects - immutable types that represent domain concepts

mod ids;
pub mod timestamp;

pub use ids::{ChatId, IdParseError, MessageId, ProvisionalIdGenerator, UserId};
