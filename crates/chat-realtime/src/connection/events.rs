//! Events emitted by connections

use serde_json::Value;

use super::Endpoint;

/// Lifecycle or data event of one connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The transport is open and frames can be sent
    Opened,
    /// A decoded inbound frame
    Frame(Value),
    /// The transport closed; `unexpected` is false only for an explicit close
    Closed { unexpected: bool },
}

/// A connection event tagged with the endpoint it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub source: Endpoint,
    pub event: ConnectionEvent,
}

impl ChannelEvent {
    pub fn new(source: Endpoint, event: ConnectionEvent) -> Self {
        Self { source, event }
    }
}
