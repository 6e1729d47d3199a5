//! Per-chat message channel

use chat_common::{Credential, SyncResult};
use chat_core::ChatId;

use crate::connection::{Connection, ConnectionSettings, ConnectionState, Endpoint};

/// Message stream of a single chat
///
/// Bound to one chat id for its whole lifetime; switching chats means
/// closing this channel and opening a new one.
#[derive(Debug)]
pub struct ChatChannel {
    chat_id: ChatId,
    connection: Connection,
}

impl ChatChannel {
    pub fn new(chat_id: ChatId, settings: ConnectionSettings) -> Self {
        Self {
            chat_id,
            connection: Connection::new(Endpoint::Chat(chat_id), settings),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// # Errors
    /// `AuthMissing` when no credential is given.
    pub fn open(&self, credential: Option<&Credential>) -> SyncResult<()> {
        self.connection.open(credential)
    }

    /// Send message content as a raw text frame
    ///
    /// # Errors
    /// `NotConnected` unless the channel is open.
    pub fn send(&self, content: &str) -> SyncResult<()> {
        self.connection.send(content)
    }

    pub fn close(&self) {
        self.connection.close();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }
}
