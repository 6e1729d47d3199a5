//! Single push-channel connection
//!
//! A connection owns at most one driver task. The driver connects, forwards
//! decoded frames, and after an unexpected close sleeps for the reconnect
//! delay before trying again. Because retrying happens inside that one loop,
//! a connection never has more than one reconnect timer outstanding.
//!
//! Every open bumps a generation counter. A driver only touches shared state
//! while its generation is current, so a replaced or closed driver can never
//! flip the state of its successor.

use chat_common::{Credential, SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use super::{ChannelEvent, ConnectionEvent, Endpoint};
use crate::transport::{Connector, TransportEvent};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Never opened
    #[default]
    Idle,
    /// Transport handshake in progress
    Connecting,
    /// Frames can be sent
    Open,
    /// Explicit close in progress
    Closing,
    /// Closed, either explicitly or while waiting to reconnect
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything a connection needs besides its endpoint
#[derive(Clone)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub connector: Arc<dyn Connector>,
    pub reconnect_delay: Duration,
    pub events: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Debug, Default)]
struct Link {
    state: ConnectionState,
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

#[derive(Debug, Default)]
struct Shared {
    link: Mutex<Link>,
    malformed: AtomicU64,
}

struct Driver {
    url: String,
    handle: JoinHandle<()>,
}

pub struct Connection {
    endpoint: Endpoint,
    settings: ConnectionSettings,
    shared: Arc<Shared>,
    driver: Mutex<Option<Driver>>,
}

impl Connection {
    pub fn new(endpoint: Endpoint, settings: ConnectionSettings) -> Self {
        Self {
            endpoint,
            settings,
            shared: Arc::new(Shared::default()),
            driver: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of inbound frames dropped because they did not decode
    pub fn malformed_frames(&self) -> u64 {
        self.shared.malformed.load(Ordering::Relaxed)
    }

    /// Start connecting to this connection's endpoint
    ///
    /// Opening the same target again while a driver is running is a no-op.
    /// A different target (a new credential) replaces the running driver,
    /// cancelling any pending reconnect.
    ///
    /// # Errors
    /// `AuthMissing` when no credential is available; nothing is attempted.
    pub fn open(&self, credential: Option<&Credential>) -> SyncResult<()> {
        let Some(credential) = credential.filter(|c| !c.is_blank()) else {
            tracing::warn!(endpoint = %self.endpoint, "Cannot open connection without a credential");
            return Err(SyncError::AuthMissing);
        };

        let url = self.endpoint.url(&self.settings.base_url, credential);
        let mut driver = self.driver.lock();

        if let Some(current) = driver.as_ref() {
            if current.url == url && !current.handle.is_finished() {
                tracing::debug!(endpoint = %self.endpoint, "Connection already running");
                return Ok(());
            }
        }

        let generation = {
            let mut link = self.shared.link.lock();
            link.generation += 1;
            link.outbound = None;
            link.state = ConnectionState::Connecting;
            link.generation
        };

        if let Some(previous) = driver.take() {
            previous.handle.abort();
            tracing::info!(endpoint = %self.endpoint, "Replacing connection target");
        }

        let context = DriverContext {
            id: Uuid::new_v4(),
            endpoint: self.endpoint,
            url: url.clone(),
            generation,
            shared: Arc::clone(&self.shared),
            connector: Arc::clone(&self.settings.connector),
            reconnect_delay: self.settings.reconnect_delay,
            events: self.settings.events.clone(),
        };

        *driver = Some(Driver {
            url,
            handle: tokio::spawn(context.run()),
        });

        Ok(())
    }

    /// Send a text frame
    ///
    /// # Errors
    /// `NotConnected` unless the connection is open; the frame is dropped,
    /// never queued.
    pub fn send(&self, text: impl Into<String>) -> SyncResult<()> {
        let link = self.shared.link.lock();
        let outbound = match (&link.state, &link.outbound) {
            (ConnectionState::Open, Some(outbound)) => outbound,
            _ => {
                tracing::debug!(endpoint = %self.endpoint, state = %link.state, "Dropping frame, not connected");
                return Err(SyncError::NotConnected);
            }
        };

        outbound.send(text.into()).map_err(|_| SyncError::NotConnected)?;
        tracing::trace!(endpoint = %self.endpoint, "Frame sent");
        Ok(())
    }

    /// Close the connection and stop reconnecting; idempotent
    pub fn close(&self) {
        let driver = self.driver.lock().take();

        let outbound = {
            let mut link = self.shared.link.lock();
            if driver.is_none() && link.state == ConnectionState::Closed {
                return;
            }
            link.state = ConnectionState::Closing;
            link.generation += 1;
            link.outbound.take()
        };

        // Dropping the sender closes the transport
        drop(outbound);
        if let Some(driver) = driver {
            driver.handle.abort();
        }

        self.shared.link.lock().state = ConnectionState::Closed;
        tracing::info!(endpoint = %self.endpoint, "Connection closed");

        let _ = self.settings.events.send(ChannelEvent::new(
            self.endpoint,
            ConnectionEvent::Closed { unexpected: false },
        ));
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            self.shared.link.lock().generation += 1;
            driver.handle.abort();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// State owned by one driver task
struct DriverContext {
    id: Uuid,
    endpoint: Endpoint,
    url: String,
    generation: u64,
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl DriverContext {
    async fn run(self) {
        let span = tracing::info_span!("connection", endpoint = %self.endpoint, driver_id = %self.id);
        self.drive().instrument(span).await;
    }

    async fn drive(self) {
        let delay_ms = self.reconnect_delay.as_millis() as u64;

        loop {
            if !self.transition(ConnectionState::Connecting) {
                return;
            }

            match self.connector.connect(&self.url).await {
                Ok(link) => {
                    if !self.attach(link.outbound) {
                        return;
                    }
                    tracing::info!("Connection open");
                    self.emit(ConnectionEvent::Opened);

                    self.pump(link.inbound).await;

                    if !self.transition(ConnectionState::Closed) {
                        return;
                    }
                    tracing::warn!(delay_ms, "Connection closed unexpectedly, reconnecting");
                    self.emit(ConnectionEvent::Closed { unexpected: true });
                }
                Err(e) => {
                    if !self.transition(ConnectionState::Closed) {
                        return;
                    }
                    tracing::warn!(error = %e, delay_ms, "Connection attempt failed, retrying");
                }
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Forward inbound events until the transport closes
    async fn pump(&self, mut inbound: mpsc::UnboundedReceiver<TransportEvent>) {
        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Text(text) => self.on_text(&text),
                TransportEvent::Error(e) => {
                    tracing::warn!(error = %e, "Transport error");
                }
                TransportEvent::Closed(reason) => {
                    tracing::debug!(reason = ?reason, "Transport closed");
                    return;
                }
            }
        }
    }

    fn on_text(&self, text: &str) {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => {
                tracing::trace!(len = text.len(), "Frame received");
                self.emit(ConnectionEvent::Frame(value));
            }
            Err(e) => {
                self.shared.malformed.fetch_add(1, Ordering::Relaxed);
                let err = SyncError::MalformedFrame(e.to_string());
                tracing::warn!(error = %err, code = err.error_code(), "Dropping malformed frame");
            }
        }
    }

    /// Set the state if this driver is still current
    fn transition(&self, state: ConnectionState) -> bool {
        let mut link = self.shared.link.lock();
        if link.generation != self.generation {
            return false;
        }
        if state != ConnectionState::Open {
            link.outbound = None;
        }
        link.state = state;
        true
    }

    fn attach(&self, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut link = self.shared.link.lock();
        if link.generation != self.generation {
            return false;
        }
        link.outbound = Some(outbound);
        link.state = ConnectionState::Open;
        true
    }

    fn emit(&self, event: ConnectionEvent) {
        if self.shared.link.lock().generation != self.generation {
            return;
        }
        let _ = self.events.send(ChannelEvent::new(self.endpoint, event));
    }
}
