//! Transport seam
//!
//! A [`Connector`] turns a URL into a [`TransportLink`]: an outbound text
//! sender plus an inbound event receiver. The connection layer only ever
//! talks to links, so the WebSocket implementation and the in-memory one used
//! by tests are interchangeable.

pub mod memory;
mod websocket;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use memory::{MemoryConnector, MemoryPeer};
pub use websocket::TungsteniteConnector;

/// Event delivered by an open link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text payload
    Text(String),
    /// Transport-level error; a `Closed` follows when the link is gone
    Error(String),
    /// The link is closed, with the peer's reason when it gave one
    Closed(Option<String>),
}

/// An open link to a push endpoint
///
/// Dropping `outbound` closes the link.
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Handshake rejected with status {0}")]
    Rejected(u16),

    #[error("Transport error: {0}")]
    Io(String),
}

/// Opens links to push endpoints
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError>;
}
