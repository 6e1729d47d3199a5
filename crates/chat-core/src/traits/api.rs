//! Request/response collaborator (port)
//!
//! The domain layer defines what it needs from the REST backend; the
//! `chat-rest` crate provides the HTTP implementation and tests provide
//! scripted ones.

use async_trait::async_trait;

use crate::entities::{Chat, Message, NewChat, User};
use crate::error::ApiResult;
use crate::value_objects::ChatId;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// List chats the current user belongs to
    async fn list_chats(&self) -> ApiResult<Vec<Chat>>;

    /// Fetch the message history of a chat
    async fn list_messages(&self, chat_id: ChatId) -> ApiResult<Vec<Message>>;

    /// Create a chat; the current user is added as a member server-side
    async fn create_chat(&self, chat: &NewChat) -> ApiResult<Chat>;

    /// Delete a chat
    async fn delete_chat(&self, chat_id: ChatId) -> ApiResult<()>;

    /// Mark every message of a chat not written by the current user as read
    async fn mark_read(&self, chat_id: ChatId) -> ApiResult<()>;

    /// List known users
    async fn list_users(&self) -> ApiResult<Vec<User>>;
}
