//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::{ChatId, MessageId, UserId};

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Chat not found: {0}")]
    ChatNotFound(ChatId),

    #[error("Message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Chat {0} has no members")]
    EmptyMembers(ChatId),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Message content is empty")]
    EmptyContent,

    // =========================================================================
    // State Errors
    // =========================================================================
    #[error("Message {0} is not awaiting retry")]
    NotRetryable(MessageId),
}

impl DomainError {
    /// Get an error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChatNotFound(_) => "UNKNOWN_CHAT",
            Self::MessageNotFound(_) => "UNKNOWN_MESSAGE",
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::EmptyMembers(_) => "EMPTY_MEMBERS",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::NotRetryable(_) => "NOT_RETRYABLE",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChatNotFound(_) | Self::MessageNotFound(_) | Self::UserNotFound(_)
        )
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::EmptyMembers(_) | Self::InvalidStatus(_) | Self::EmptyContent
        )
    }
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
