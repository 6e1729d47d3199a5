//! # chat-common
//!
//! Shared utilities including configuration, error handling, credentials, and telemetry.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Credential, CredentialProvider, StaticCredentials};
pub use config::{
    ApiConfig, AppSettings, ClientConfig, ConfigError, Environment, RealtimeConfig,
};
pub use error::{ErrorNotice, SyncError, SyncResult};
pub use telemetry::{
    init_tracing, try_init_tracing, try_init_tracing_with_config, LogFormat, TracingConfig,
    TracingError,
};
