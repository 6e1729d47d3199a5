//! reqwest-backed chat API client

use async_trait::async_trait;
use chat_common::{ApiConfig, CredentialProvider};
use chat_core::{ApiError, ApiResult, Chat, ChatApi, ChatId, Message, NewChat, User};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

/// Error body returned by the backend (`{"detail": "..."}`)
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

pub struct HttpChatApi {
    client: Client,
    base_url: String,
    page_size: u32,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpChatApi {
    /// Create a client from configuration
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialProvider>) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self::with_client(client, config, credentials))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(
        client: Client,
        config: &ApiConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn page(&self) -> [(&'static str, u32); 2] {
        [("skip", 0), ("limit", self.page_size)]
    }

    /// Build an authenticated request
    fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let credential = self
            .credentials
            .current()
            .ok_or(ApiError::MissingCredential)?;

        Ok(self
            .client
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, credential.bearer()))
    }

    async fn send(&self, builder: RequestBuilder, what: &'static str) -> ApiResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(request = what, error = %e, "Request failed to complete");
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            tracing::trace!(request = what, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| match b.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or(text);

        tracing::warn!(request = what, status = status.as_u16(), body = %body, "Request rejected");
        Err(ApiError::from_status(status.as_u16(), body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &'static str) -> ApiResult<T> {
        let builder = self.request(Method::GET, path)?.query(&self.page());
        let response = self.send(builder, what).await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Decode list entries one by one, skipping the ones that do not decode
fn decode_each<T: DeserializeOwned>(entries: Vec<serde_json::Value>, what: &'static str) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(request = what, index, error = %e, "Skipping undecodable entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_chats(&self) -> ApiResult<Vec<Chat>> {
        let entries = self.get_json("/chats/", "list_chats").await?;
        Ok(decode_each(entries, "list_chats"))
    }

    async fn list_messages(&self, chat_id: ChatId) -> ApiResult<Vec<Message>> {
        self.get_json(&format!("/chats/{chat_id}/messages/"), "list_messages")
            .await
    }

    async fn create_chat(&self, chat: &NewChat) -> ApiResult<Chat> {
        let builder = self.request(Method::POST, "/chats/")?.json(chat);
        let response = self.send(builder, "create_chat").await?;
        decode(response).await
    }

    async fn delete_chat(&self, chat_id: ChatId) -> ApiResult<()> {
        let builder = self.request(Method::DELETE, &format!("/chats/{chat_id}"))?;
        self.send(builder, "delete_chat").await?;
        Ok(())
    }

    async fn mark_read(&self, chat_id: ChatId) -> ApiResult<()> {
        let builder = self.request(Method::PUT, &format!("/chats/{chat_id}/messages/read"))?;
        self.send(builder, "mark_read").await?;
        Ok(())
    }

    async fn list_users(&self) -> ApiResult<Vec<User>> {
        self.get_json("/users/", "list_users").await
    }
}
