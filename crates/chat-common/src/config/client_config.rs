//! Client configuration structs
//!
//! Loads configuration from environment variables (and `.env` when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// REST backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl ApiConfig {
    /// Config pointing at `base_url` with default limits
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            page_size: default_page_size(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Realtime (WebSocket) configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub ws_base_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_echo_window_secs")]
    pub echo_window_secs: u64,
}

impl RealtimeConfig {
    /// Config pointing at `ws_base_url` with default timings
    #[must_use]
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            echo_window_secs: default_echo_window_secs(),
        }
    }

    /// Fixed delay between an unexpected close and the next attempt
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Maximum clock distance between a provisional message and its echo
    #[must_use]
    pub fn echo_window(&self) -> Duration {
        Duration::from_secs(self.echo_window_secs)
    }
}

// serde defaults
fn default_app_name() -> String {
    "chat-sync".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_echo_window_secs() -> u64 {
    30
}

/// Read an optional variable, failing only when it is present but unparsable
fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(None),
    }
}

fn required_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

impl ClientConfig {
    /// Build the client configuration from `APP_*` and `CHAT_*` variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or a
    /// numeric variable cannot be parsed
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is fine; the process environment still applies
        let _ = dotenvy::dotenv();

        let env_name = env::var("APP_ENV").ok();
        let app_env = match env_name {
            Some(raw) => Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?,
            None => Environment::default(),
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: app_env,
            },
            api: ApiConfig {
                base_url: required_var("CHAT_API_URL")?,
                timeout_secs: parse_var("CHAT_API_TIMEOUT_SECS")?
                    .unwrap_or_else(default_timeout_secs),
                page_size: parse_var("CHAT_API_PAGE_SIZE")?.unwrap_or_else(default_page_size),
            },
            realtime: RealtimeConfig {
                ws_base_url: required_var("CHAT_WS_URL")?,
                reconnect_delay_ms: parse_var("CHAT_RECONNECT_DELAY_MS")?
                    .unwrap_or_else(default_reconnect_delay_ms),
                echo_window_secs: parse_var("CHAT_ECHO_WINDOW_SECS")?
                    .unwrap_or_else(default_echo_window_secs),
            },
        })
    }

    /// Build a config from explicit base URLs, defaults everywhere else
    #[must_use]
    pub fn new(api_url: impl Into<String>, ws_url: impl Into<String>) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            api: ApiConfig::new(api_url),
            realtime: RealtimeConfig::new(ws_url),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
