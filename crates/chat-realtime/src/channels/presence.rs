//! Global status channel

use chat_common::{Credential, SyncResult};
use chat_core::UserStatus;
use serde_json::json;

use crate::connection::{Connection, ConnectionSettings, ConnectionState, Endpoint};

/// Channel carrying presence updates and chat-list mutations
#[derive(Debug)]
pub struct PresenceChannel {
    connection: Connection,
}

impl PresenceChannel {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            connection: Connection::new(Endpoint::Status, settings),
        }
    }

    /// Open the channel with the given credential
    ///
    /// # Errors
    /// `AuthMissing` when no credential is given.
    pub fn open(&self, credential: Option<&Credential>) -> SyncResult<()> {
        self.connection.open(credential)
    }

    /// Publish our own status as `{"status": ..}`
    ///
    /// # Errors
    /// `NotConnected` unless the channel is open.
    pub fn update_status(&self, status: UserStatus) -> SyncResult<()> {
        let frame = json!({ "status": status.as_str() });
        self.connection.send(frame.to_string())?;
        tracing::debug!(status = %status, "Status published");
        Ok(())
    }

    pub fn close(&self) {
        self.connection.close();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}
