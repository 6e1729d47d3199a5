//! Push channels
//!
//! Thin specializations of [`Connection`](crate::connection::Connection)
//! bound to one endpoint shape each.

mod chat;
mod presence;

pub use chat::ChatChannel;
pub use presence::PresenceChannel;
