//! Synchronizer
//!
//! Owns the session store and every push channel of a session. Inbound
//! channel events are funnelled through one pump task, so handlers for the
//! same connection never overlap; user actions run on the caller's task and
//! may interleave with them arbitrarily. Correctness under that interleaving
//! comes from the store's guards (dedup by id, active-chat checks), not from
//! holding locks across requests.
//!
//! No lock is ever held across an `.await`.

use chat_common::{CredentialProvider, RealtimeConfig, SyncError, SyncResult};
use chat_core::{
    Chat, ChatApi, ChatId, DomainError, Message, MessageId, NewChat, ProvisionalIdGenerator,
    UserId, UserStatus,
};
use chat_store::{MergeOutcome, SessionSnapshot, SessionStore};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use validator::Validate;

use super::SyncNotice;
use crate::channels::{ChatChannel, PresenceChannel};
use crate::connection::{ChannelEvent, ConnectionEvent, ConnectionSettings, ConnectionState, Endpoint};
use crate::protocol::{decode_message, server_error, ChatMutation, PresenceFrame};
use crate::transport::Connector;

const NOTICE_CAPACITY: usize = 64;

/// Realtime synchronizer for one client
///
/// Cheap to clone; all clones drive the same session. Must be created inside
/// a tokio runtime.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn ChatApi>,
    credentials: Arc<dyn CredentialProvider>,
    settings: ConnectionSettings,
    store: SessionStore,
    presence: PresenceChannel,
    chat: Mutex<Option<ChatChannel>>,
    current_user: RwLock<Option<UserId>>,
    ids: ProvisionalIdGenerator,
    notices: broadcast::Sender<SyncNotice>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Synchronizer {
    pub fn new(
        config: &RealtimeConfig,
        api: Arc<dyn ChatApi>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let settings = ConnectionSettings {
            base_url: config.ws_base_url.clone(),
            connector,
            reconnect_delay: config.reconnect_delay(),
            events: events_tx,
        };
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let inner = Arc::new(Inner {
            api,
            credentials,
            presence: PresenceChannel::new(settings.clone()),
            settings,
            store: SessionStore::new(config.echo_window()),
            chat: Mutex::new(None),
            current_user: RwLock::new(None),
            ids: ProvisionalIdGenerator::new(),
            notices,
            pump: Mutex::new(None),
        });

        let handle = tokio::spawn(run_pump(Arc::downgrade(&inner), events_rx));
        *inner.pump.lock() = Some(handle);

        Self { inner }
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Start a session for `user`
    ///
    /// Opens the status channel, then loads the chat list and the roster.
    ///
    /// # Errors
    /// `AuthMissing` without a credential; request failures as reported by
    /// the backend (`SessionExpired` after a rejected credential).
    pub async fn start_session(&self, user: UserId) -> SyncResult<()> {
        let inner = &self.inner;
        let credential = inner.credentials.current().ok_or_else(|| {
            tracing::warn!(user_id = %user, "Cannot start session without a credential");
            SyncError::AuthMissing
        })?;

        *inner.current_user.write() = Some(user);
        inner.presence.open(Some(&credential))?;

        self.refresh_chats().await?;
        self.refresh_users().await?;

        tracing::info!(user_id = %user, "Session started");
        Ok(())
    }

    /// Tear the session down: chat channel, status channel, then the store
    ///
    /// Idempotent.
    pub fn end_session(&self) {
        self.inner.end_session();
    }

    pub fn current_user(&self) -> Option<UserId> {
        *self.inner.current_user.read()
    }

    // ------------------------------------------------------------------
    // Chats
    // ------------------------------------------------------------------

    /// Make `chat_id` the active chat
    ///
    /// Opens its channel (closing the previous one), loads the history and
    /// marks the chat read. A history response that arrives after the user
    /// moved on to another chat is discarded, and so is a failed one unless
    /// it rejected the credential. On any error before the fetch the previous
    /// chat and its channel stay as they were.
    ///
    /// # Errors
    /// `NoSession`, `ChatNotFound` for a chat not in the list, `AuthMissing`,
    /// or the failure of the history request.
    pub async fn activate_chat(&self, chat_id: ChatId) -> SyncResult<()> {
        let inner = &self.inner;
        let me = inner.require_session()?;

        if !inner.store.contains_chat(chat_id) {
            return Err(DomainError::ChatNotFound(chat_id).into());
        }
        let credential = inner.credentials.current().ok_or(SyncError::AuthMissing)?;

        {
            // Active chat and channel slot only change together, under this lock
            let mut slot = inner.chat.lock();
            if !inner.store.contains_chat(chat_id) {
                return Err(DomainError::ChatNotFound(chat_id).into());
            }

            let channel = ChatChannel::new(chat_id, inner.settings.clone());
            channel.open(Some(&credential))?;
            if let Some(previous) = slot.replace(channel) {
                previous.close();
            }
            inner.store.set_active_chat(Some(chat_id));
        }
        tracing::info!(chat_id = %chat_id, "Chat activated");

        let history = match inner.api.list_messages(chat_id).await {
            Ok(history) => history,
            Err(e) => {
                let err = SyncError::from(e);
                if !err.is_fatal() && inner.store.active_chat_id() != Some(chat_id) {
                    tracing::debug!(chat_id = %chat_id, error = %err, "Discarding stale history failure");
                    return Ok(());
                }
                return Err(inner.escalate(err, "load history"));
            }
        };

        let count = history.len();
        if !inner.store.replace_history(chat_id, history) {
            tracing::debug!(chat_id = %chat_id, "Discarding stale history");
            return Ok(());
        }
        tracing::debug!(chat_id = %chat_id, count, "History loaded");

        match inner.api.mark_read(chat_id).await {
            Ok(()) => {
                inner.store.mark_read_except(chat_id, me);
            }
            Err(e) => {
                let err = SyncError::from(e);
                if err.is_fatal() {
                    inner.expire();
                    return Err(err);
                }
                tracing::warn!(chat_id = %chat_id, error = %err, "Failed to mark chat read");
            }
        }

        Ok(())
    }

    /// Delete a chat optimistically
    ///
    /// The chat leaves the list at once. If the backend refuses, the list is
    /// re-fetched instead of restoring the old entry.
    ///
    /// # Errors
    /// `NoSession`, or the failure of the delete request.
    pub async fn delete_chat(&self, chat_id: ChatId) -> SyncResult<()> {
        let inner = &self.inner;
        inner.require_session()?;

        let removal = inner.remove_chat(chat_id);
        tracing::debug!(chat_id = %chat_id, removed = removal.removed, "Chat removed locally");

        let Err(e) = inner.api.delete_chat(chat_id).await else {
            tracing::info!(chat_id = %chat_id, "Chat deleted");
            return Ok(());
        };

        let err = inner.escalate(e.into(), "delete chat");
        if !err.is_fatal() {
            if let Err(resync) = self.refresh_chats().await {
                tracing::warn!(error = %resync, "Chat list resync failed");
            }
        }
        Err(err)
    }

    /// Create a chat and insert it into the list
    ///
    /// # Errors
    /// `NoSession`, `Validation` for a bad name or member list, or the
    /// failure of the create request.
    pub async fn create_chat(&self, chat: NewChat) -> SyncResult<Chat> {
        let inner = &self.inner;
        inner.require_session()?;
        chat.validate().map_err(DomainError::from)?;

        let created = inner
            .api
            .create_chat(&chat)
            .await
            .map_err(|e| inner.escalate(e.into(), "create chat"))?;

        if !inner.store.insert_chat(created.clone()) {
            tracing::debug!(chat_id = %created.id, "Created chat already known");
        }
        tracing::info!(chat_id = %created.id, name = %created.name, "Chat created");
        Ok(created)
    }

    /// Replace the chat list with the authoritative one
    ///
    /// # Errors
    /// The failure of the list request.
    pub async fn refresh_chats(&self) -> SyncResult<()> {
        let inner = &self.inner;
        let chats = inner
            .api
            .list_chats()
            .await
            .map_err(|e| inner.escalate(e.into(), "load chats"))?;
        tracing::debug!(count = chats.len(), "Chat list loaded");
        inner.replace_chats(chats);
        Ok(())
    }

    /// Reload the user roster
    ///
    /// # Errors
    /// The failure of the list request.
    pub async fn refresh_users(&self) -> SyncResult<()> {
        let inner = &self.inner;
        let users = inner
            .api
            .list_users()
            .await
            .map_err(|e| inner.escalate(e.into(), "load users"))?;
        inner.store.set_users(users);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Send a message to the active chat
    ///
    /// A provisional entry shows up immediately. If the channel is not open
    /// the entry stays visible, flagged as failed, and `NotConnected` is
    /// returned; nothing is retried automatically.
    ///
    /// # Errors
    /// `NoSession`, `EmptyContent`, `NoActiveChat` or `NotConnected`.
    pub fn send(&self, content: &str) -> SyncResult<MessageId> {
        let inner = &self.inner;
        let me = inner.require_session()?;

        if Message::is_blank(content) {
            return Err(DomainError::EmptyContent.into());
        }
        let chat_id = inner.store.active_chat_id().ok_or(SyncError::NoActiveChat)?;

        let id = inner.ids.generate();
        let message = Message::provisional(id, chat_id, me, content, Utc::now());
        if !inner.store.push_provisional(message) {
            return Err(SyncError::NoActiveChat);
        }

        if let Err(e) = inner.transmit(chat_id, content) {
            inner.store.mark_failed(id);
            tracing::warn!(chat_id = %chat_id, message_id = %id, error = %e, "Send failed");
            return Err(e);
        }

        tracing::debug!(chat_id = %chat_id, message_id = %id, "Message sent");
        Ok(id)
    }

    /// Send a failed message again
    ///
    /// # Errors
    /// `MessageNotFound`, `NotRetryable` for a message that has not failed,
    /// or `NotConnected`, which leaves it failed.
    pub fn retry_message(&self, id: MessageId) -> SyncResult<()> {
        let inner = &self.inner;
        inner.require_session()?;

        let message = inner.store.retry_message(id, Utc::now())?;
        if let Err(e) = inner.transmit(message.chat_id, &message.content) {
            inner.store.mark_failed(id);
            tracing::warn!(message_id = %id, error = %e, "Retry failed");
            return Err(e);
        }

        tracing::debug!(message_id = %id, "Message resent");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Publish our own status
    ///
    /// # Errors
    /// `NoSession` or `NotConnected`.
    pub fn set_status(&self, status: UserStatus) -> SyncResult<()> {
        self.inner.require_session()?;
        self.inner.presence.update_status(status)
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.store.snapshot()
    }

    /// Receive a snapshot after every state change
    pub fn observe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.store.subscribe()
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SyncNotice> {
        self.inner.notices.subscribe()
    }

    pub fn dismiss_error(&self) {
        self.inner.store.dismiss_error();
    }

    pub fn presence_state(&self) -> ConnectionState {
        self.inner.presence.state()
    }

    /// Active chat channel and its state
    pub fn chat_state(&self) -> Option<(ChatId, ConnectionState)> {
        self.inner
            .chat
            .lock()
            .as_ref()
            .map(|channel| (channel.chat_id(), channel.state()))
    }
}

impl Inner {
    fn require_session(&self) -> SyncResult<UserId> {
        (*self.current_user.read()).ok_or(SyncError::NoSession)
    }

    fn transmit(&self, chat_id: ChatId, content: &str) -> SyncResult<()> {
        match self.chat.lock().as_ref() {
            Some(channel) if channel.chat_id() == chat_id => channel.send(content),
            _ => Err(SyncError::NotConnected),
        }
    }

    /// Remove a chat and close its channel if it was the active one
    fn remove_chat(&self, chat_id: ChatId) -> chat_store::ChatRemoval {
        let mut slot = self.chat.lock();
        let removal = self.store.remove_chat(chat_id);
        if removal.was_active {
            close_channel(&mut slot, chat_id);
        }
        removal
    }

    /// Install the authoritative chat list, closing the channel of an active
    /// chat that is no longer in it
    fn replace_chats(&self, chats: Vec<Chat>) {
        let mut slot = self.chat.lock();
        if let Some(dropped) = self.store.replace_chats(chats) {
            tracing::info!(chat_id = %dropped, "Active chat left the chat list");
            close_channel(&mut slot, dropped);
        }
    }

    /// Route a failed request: expire on a rejected credential, otherwise
    /// surface it to the user
    fn escalate(&self, err: SyncError, context: &'static str) -> SyncError {
        if err.is_fatal() {
            self.expire();
            return err;
        }

        tracing::warn!(context, error = %err, code = err.error_code(), "Request failed");
        self.store.set_error(err.to_string());
        let _ = self.notices.send(SyncNotice::error(&err));
        err
    }

    fn expire(&self) {
        tracing::error!("Credential rejected, tearing session down");
        self.end_session();
        self.credentials.invalidate();
        let _ = self.notices.send(SyncNotice::SessionExpired);
    }

    fn end_session(&self) {
        let user = self.current_user.write().take();

        if let Some(channel) = self.chat.lock().take() {
            channel.close();
        }
        self.presence.close();
        self.store.clear();

        if let Some(user) = user {
            tracing::info!(user_id = %user, "Session ended");
        }
    }

    // ------------------------------------------------------------------
    // Inbound events
    // ------------------------------------------------------------------

    fn handle_event(&self, event: ChannelEvent) {
        if self.current_user.read().is_none() {
            tracing::trace!(source = %event.source, "Dropping event outside a session");
            return;
        }

        match (event.source, event.event) {
            (Endpoint::Status, ConnectionEvent::Frame(value)) => self.on_status_frame(value),
            (Endpoint::Chat(chat_id), ConnectionEvent::Frame(value)) => {
                self.on_chat_frame(chat_id, &value);
            }
            (source, ConnectionEvent::Opened) => {
                tracing::debug!(source = %source, "Channel open");
            }
            (source, ConnectionEvent::Closed { unexpected }) => {
                tracing::debug!(source = %source, unexpected, "Channel closed");
            }
        }
    }

    fn on_status_frame(&self, value: Value) {
        if let Some(error) = server_error(&value) {
            tracing::warn!(error, "Status channel reported an error");
            let _ = self.notices.send(SyncNotice::UnknownFrame(value));
            return;
        }

        match PresenceFrame::classify(value) {
            PresenceFrame::Status(entry) => {
                tracing::trace!(user_id = %entry.user_id, status = %entry.status, "Presence update");
                self.store.upsert_presence(entry);
            }
            PresenceFrame::Chat(mutation) => self.apply_chat_mutation(mutation),
            PresenceFrame::Unknown(value) => {
                tracing::debug!("Unclassified status frame");
                let _ = self.notices.send(SyncNotice::UnknownFrame(value));
            }
        }
    }

    fn apply_chat_mutation(&self, mutation: ChatMutation) {
        let action = mutation.action();
        let chat_id = mutation.chat_id();

        let changed = match mutation {
            ChatMutation::Created(chat) => self.store.insert_chat(chat),
            ChatMutation::Updated(chat) => self.store.update_chat(chat),
            ChatMutation::Deleted(id) => self.remove_chat(id).removed,
        };

        tracing::debug!(action = %action, chat_id = %chat_id, changed, "Chat event applied");
    }

    fn on_chat_frame(&self, source: ChatId, value: &Value) {
        let message = match decode_message(value) {
            Ok(message) => message,
            Err(e) => {
                match server_error(value) {
                    Some(error) => tracing::warn!(chat_id = %source, error, "Chat channel reported an error"),
                    None => tracing::warn!(chat_id = %source, error = %e, "Undecodable chat frame"),
                }
                let _ = self.notices.send(SyncNotice::UnknownFrame(value.clone()));
                return;
            }
        };

        let message_id = message.id;
        match self.store.merge_message(message) {
            MergeOutcome::Appended => {
                tracing::trace!(chat_id = %source, message_id = %message_id, "Message appended");
            }
            MergeOutcome::Reconciled(provisional) => {
                tracing::debug!(message_id = %message_id, provisional = %provisional, "Echo reconciled");
            }
            MergeOutcome::Duplicate => {
                tracing::trace!(message_id = %message_id, "Duplicate message ignored");
            }
            MergeOutcome::StaleChat => {
                tracing::debug!(chat_id = %source, message_id = %message_id, "Message for inactive chat ignored");
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = self.pump.get_mut().take() {
            handle.abort();
        }
    }
}

fn close_channel(slot: &mut Option<ChatChannel>, chat_id: ChatId) {
    if let Some(channel) = slot.take_if(|channel| channel.chat_id() == chat_id) {
        channel.close();
    }
}

/// Apply channel events one at a time until the synchronizer goes away
async fn run_pump(inner: Weak<Inner>, mut events: mpsc::UnboundedReceiver<ChannelEvent>) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle_event(event);
    }
    tracing::debug!("Event pump stopped");
}
