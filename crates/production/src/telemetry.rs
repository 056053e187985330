//! Logging initialization.
//!
//! Installs a global `tracing` subscriber: an env filter (from `RUST_LOG`,
//! falling back to the configured default) and a fmt layer.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to set global subscriber: {0}")]
    SetSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Configuration for telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset (e.g. `"info"`).
    pub default_filter: String,
    /// Include thread ids in log lines.
    pub with_thread_ids: bool,
    /// Colorize output.
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            with_thread_ids: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Log everything at debug level and above, including every forwarded call.
    pub fn verbose() -> Self {
        Self {
            default_filter: "debug".to_string(),
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_filter).map_err(|source| {
                TelemetryError::InvalidFilter {
                    filter: self.default_filter.clone(),
                    source,
                }
            }),
        }
    }
}

/// Initialize telemetry with the given configuration.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = config.env_filter()?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(config.with_thread_ids)
        .with_ansi(config.ansi);

    let subscriber = Registry::default().with(env_filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}
