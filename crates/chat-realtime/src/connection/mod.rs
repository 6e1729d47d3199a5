//! Push-channel connections

mod connection;
mod endpoint;
mod events;

pub use connection::{Connection, ConnectionSettings, ConnectionState};
pub use endpoint::Endpoint;
pub use events::{ChannelEvent, ConnectionEvent};
