//! Bearer credential and its supplier

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Opaque bearer token
///
/// `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Check if the token is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<redacted>").finish()
    }
}

impl From<&str> for Credential {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

/// Supplier of the current credential
pub trait CredentialProvider: Send + Sync {
    /// The credential to use right now, if any
    fn current(&self) -> Option<Credential>;

    /// Drop the credential after the backend rejected it
    fn invalidate(&self);
}

/// In-process credential holder
#[derive(Debug, Default)]
pub struct StaticCredentials {
    inner: RwLock<Option<Credential>>,
}

impl StaticCredentials {
    /// Create a holder with an initial credential
    pub fn new(credential: impl Into<Credential>) -> Self {
        Self {
            inner: RwLock::new(Some(credential.into())),
        }
    }

    /// Create an empty holder
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a holder wrapped in Arc
    pub fn shared(credential: impl Into<Credential>) -> Arc<Self> {
        Arc::new(Self::new(credential))
    }

    /// Replace the credential (e.g. after login)
    pub fn set(&self, credential: impl Into<Credential>) {
        *self.inner.write() = Some(credential.into());
    }
}

impl CredentialProvider for StaticCredentials {
    fn current(&self) -> Option<Credential> {
        self.inner
            .read()
            .as_ref()
            .filter(|c| !c.is_blank())
            .cloned()
    }

    fn invalidate(&self) {
        if self.inner.write().take().is_some() {
            tracing::debug!("Credential invalidated");
        }
    }
}
