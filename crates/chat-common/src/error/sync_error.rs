//! Synchronization error types
//!
//! Unified error handling for the realtime client.

use chat_core::{ApiError, DomainError};
use serde::Serialize;
use std::fmt;

/// Client-wide error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    // Session errors
    #[error("No credential available")]
    AuthMissing,

    #[error("Session expired")]
    SessionExpired,

    #[error("No session started")]
    NoSession,

    // Connection errors
    #[error("Connection is not open")]
    NotConnected,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    // Request errors
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("No active chat")]
    NoActiveChat,

    // Domain errors
    #[error(transparent)]
    Domain(#[from] DomainError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Internal errors
    #[error("Internal error")]
    Internal(#[source] anyhow::Error),
}

impl SyncError {
    /// Get error code for notices and logs
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AuthMissing => "AUTH_MISSING",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::NoSession => "NO_SESSION",
            Self::NotConnected => "NOT_CONNECTED",
            Self::MalformedFrame(_) => "MALFORMED_FRAME",
            Self::RequestFailed(_) => "REQUEST_FAILED",
            Self::NoActiveChat => "NO_ACTIVE_CHAT",
            Self::Domain(e) => e.code(),
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Check if this error tears the whole session down
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Check if the caller can simply retry or carry on
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::MalformedFrame(_) | Self::RequestFailed(_)
        )
    }

    /// Create a request failure from any displayable cause
    #[must_use]
    pub fn request_failed(msg: impl fmt::Display) -> Self {
        Self::RequestFailed(msg.to_string())
    }

    /// Create an internal error from any error
    pub fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }
}

impl From<ApiError> for SyncError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::SessionExpired,
            ApiError::MissingCredential => Self::AuthMissing,
            other => Self::RequestFailed(other.to_string()),
        }
    }
}

/// Error payload surfaced to observers
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorNotice {
    pub code: String,
    pub message: String,
}

impl From<&SyncError> for ErrorNotice {
    fn from(err: &SyncError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for synchronization operations
pub type SyncResult<T> = Result<T, SyncError>;
