//! Domain entities - core business objects

mod chat;
mod message;
mod presence;
mod user;

pub use chat::{Chat, NewChat};
pub use message::Message;
pub use presence::{PresenceEntry, UserStatus};
pub use user::User;
