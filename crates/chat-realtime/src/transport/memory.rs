//! In-process transport
//!
//! Every successful `connect` hands a [`MemoryPeer`] to whoever is waiting in
//! [`MemoryConnector::accept`]. The peer plays the server: it pushes frames,
//! reads what the client sent, and can drop the link to simulate an
//! unexpected close.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{Connector, TransportError, TransportEvent, TransportLink};

#[derive(Debug, Default)]
struct Attempts {
    urls: Vec<String>,
    refuse: bool,
}

/// Connector that links clients to in-process peers
#[derive(Clone)]
pub struct MemoryConnector {
    attempts: Arc<Mutex<Attempts>>,
    peers_tx: mpsc::UnboundedSender<MemoryPeer>,
    peers_rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>>,
}

impl MemoryConnector {
    #[must_use]
    pub fn new() -> Self {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        Self {
            attempts: Arc::new(Mutex::new(Attempts::default())),
            peers_tx,
            peers_rx: Arc::new(tokio::sync::Mutex::new(peers_rx)),
        }
    }

    /// Wait for the next accepted link
    pub async fn accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.lock().await.recv().await
    }

    /// Take an already accepted link without waiting
    pub fn try_accept(&self) -> Option<MemoryPeer> {
        self.peers_rx.try_lock().ok()?.try_recv().ok()
    }

    /// Refuse (or accept again) subsequent connection attempts
    pub fn set_refuse(&self, refuse: bool) {
        self.attempts.lock().refuse = refuse;
    }

    /// Every URL a connection was attempted to, in order
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().urls.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().urls.len()
    }

    /// Number of attempts whose URL contains `needle`
    pub fn attempts_matching(&self, needle: &str) -> usize {
        self.attempts
            .lock()
            .urls
            .iter()
            .filter(|u| u.contains(needle))
            .count()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        {
            let mut attempts = self.attempts.lock();
            attempts.urls.push(url.to_string());
            if attempts.refuse {
                return Err(TransportError::Refused(url.to_string()));
            }
        }

        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.peers_tx
            .send(peer)
            .map_err(|_| TransportError::Io("memory connector shut down".to_string()))?;

        Ok(TransportLink { outbound, inbound })
    }
}

/// Server side of an in-memory link
pub struct MemoryPeer {
    url: String,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Push a raw text frame; `false` if the client is gone
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(TransportEvent::Text(text.into())).is_ok()
    }

    /// Push a JSON frame
    pub fn push_json(&self, value: &Value) -> bool {
        self.push_text(value.to_string())
    }

    /// Report a transport error without closing
    pub fn emit_error(&self, message: impl Into<String>) -> bool {
        self.to_client.send(TransportEvent::Error(message.into())).is_ok()
    }

    /// Close the link from the server side
    pub fn drop_connection(self) {
        let _ = self.to_client.send(TransportEvent::Closed(None));
    }

    /// Next frame sent by the client; `None` once the client closed the link
    pub async fn recv_outbound(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Next frame sent by the client, if one is already queued
    pub fn try_recv_outbound(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}
