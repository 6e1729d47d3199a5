//! # chat-realtime
//!
//! Realtime synchronization for the chat client: push-channel connections
//! with fixed-delay reconnection, inbound frame classification, and the
//! [`Synchronizer`] that merges everything into the session store.

pub mod channels;
pub mod connection;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use channels::{ChatChannel, PresenceChannel};
pub use connection::{
    ChannelEvent, Connection, ConnectionEvent, ConnectionSettings, ConnectionState, Endpoint,
};
pub use protocol::{ChatAction, ChatMutation, PresenceFrame};
pub use sync::{SyncNotice, Synchronizer};
pub use transport::{
    Connector, MemoryConnector, MemoryPeer, TransportError, TransportEvent, TransportLink,
    TungsteniteConnector,
};
