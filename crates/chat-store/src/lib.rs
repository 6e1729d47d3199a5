//! # chat-store
//!
//! In-memory session state for the realtime client.
//!
//! ## Features
//!
//! - **Chat list**: ordered, idempotent insert, full-replace updates
//! - **Timeline**: the active chat's messages, deduplicated by id and ordered
//!   by `(created_at, id)`, with provisional entries for optimistic sends
//! - **Presence**: one entry per user, overwritten on every update
//! - **Snapshots**: every change is published on a `tokio::sync::watch` channel
//!
//! ## Example
//!
//! ```ignore
//! use chat_store::{MergeOutcome, SessionStore};
//!
//! let store = SessionStore::default();
//! store.replace_chats(chats);
//! store.set_active_chat(Some(chat_id));
//!
//! let mut updates = store.subscribe();
//! assert_eq!(store.merge_message(pushed), MergeOutcome::Appended);
//! updates.changed().await?;
//! ```

pub mod chat_list;
pub mod presence;
pub mod snapshot;
pub mod store;
pub mod timeline;

pub use chat_list::ChatList;
pub use presence::PresenceMap;
pub use snapshot::SessionSnapshot;
pub use store::{ChatRemoval, SessionStore, DEFAULT_ECHO_WINDOW};
pub use timeline::{MergeOutcome, Timeline};
