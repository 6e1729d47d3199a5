//! Wire protocol of the push channels
//!
//! Outbound frames are trivial (raw text on chat channels, `{"status": ..}`
//! on the status channel) and are built by the channels themselves. This
//! module covers the inbound side.

pub mod actions;
pub mod frames;

pub use actions::{ChatAction, CHAT_ACTION_PREFIX};
pub use frames::{decode_message, server_error, ChatMutation, PresenceFrame};
