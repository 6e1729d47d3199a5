//! Tracing and logging setup
//!
//! One subscriber per process: an `EnvFilter` (from `RUST_LOG`, else the
//! configured level) in front of a single `fmt` layer, plain or JSON.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::Environment;

/// Output encoding of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = TracingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" | "pretty" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(TracingError::UnknownFormat(other.to_string())),
        }
    }
}

/// Subscriber options for the sync client
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Fallback filter when `RUST_LOG` is unset
    pub level: Level,
    pub format: LogFormat,
    /// Emit span open/close events (connection drivers run inside spans)
    pub span_events: bool,
    /// Source location on every line
    pub file_line: bool,
    /// Module path of the emitting target
    pub targets: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Plain,
            span_events: false,
            file_line: true,
            targets: true,
        }
    }
}

impl TracingConfig {
    /// Debug level with span events, for local runs against a dev backend
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            ..Self::default()
        }
    }

    /// JSON at info, no source locations
    #[must_use]
    pub fn production() -> Self {
        Self {
            format: LogFormat::Json,
            file_line: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    /// Apply `LOG_FORMAT` when it is set to a known format
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(format) = std::env::var("LOG_FORMAT")
            .ok()
            .and_then(|raw| raw.parse().ok())
        {
            self.format = format;
        }
        self
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Install the default subscriber
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    if let Err(e) = try_init_tracing() {
        panic!("{e}");
    }
}

/// Install the default subscriber unless one is already set
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install a subscriber built from `config`
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let base = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_target(config.targets)
        .with_span_events(config.span_events());

    let layer = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Plain => base.boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(layer)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,

    #[error("Unknown log format: {0}")]
    UnknownFormat(String),
}
