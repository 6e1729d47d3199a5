//! Credential handling
//!
//! The credential is an opaque bearer token supplied by an external auth
//! collaborator. The client never decodes it; it only attaches it to requests
//! and drops it when the backend rejects it.

mod credential;

pub use credential::{Credential, CredentialProvider, StaticCredentials};
