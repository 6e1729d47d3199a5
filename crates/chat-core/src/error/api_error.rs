//! Errors returned by the request/response collaborator

use thiserror::Error;

/// Failure of an authoritative request
#[derive(Debug, Error)]
pub enum ApiError {
    /// The credential was rejected (401)
    #[error("Credential rejected")]
    Unauthorized,

    /// No credential available to attach
    #[error("No credential available")]
    MissingCredential,

    /// Non-success status other than 401
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, timeout or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not decode
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// Check if the credential must be considered invalid
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Build from an HTTP status and body text
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        if status == 401 {
            Self::Unauthorized
        } else {
            Self::Status {
                status,
                body: body.into(),
            }
        }
    }
}

/// Result type for collaborator calls
pub type ApiResult<T> = Result<T, ApiError>;
