//! Proxy configuration.
//!
//! Every field has a default, so an empty (or absent) file is a valid
//! configuration. Example TOML:
//!
//! ```toml
//! [abci]
//! listen_addr = "tcp://0.0.0.0:46658"
//! connection_limit = 16
//!
//! [downstream]
//! addr = "tcp://127.0.0.1:46659"
//! timeout_ms = 10000
//! connect_retries = 30
//! retry_interval_ms = 500
//! echo_prefix = ""
//!
//! [rpc]
//! enabled = true
//! listen_addr = "tcp://0.0.0.0:46660"
//!
//! [scheduler]
//! intake_capacity = 1024
//! ```

use abci_proxy_scheduler::{SchedulerConfig, DEFAULT_INTAKE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unsupported address scheme in {0:?}, only tcp:// is supported")]
    UnsupportedScheme(String),
}

/// Top-level proxy configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    /// Listener for the consensus engine
    #[serde(default)]
    pub abci: AbciConfig,

    /// The real application behind the proxy
    #[serde(default)]
    pub downstream: DownstreamConfig,

    /// Control-plane server
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Validator change scheduler
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

/// ABCI listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciConfig {
    /// Address the engine connects to
    #[serde(default = "default_abci_addr")]
    pub listen_addr: String,

    /// Maximum concurrent engine connections
    #[serde(default = "default_connection_limit")]
    pub connection_limit: usize,
}

impl Default for AbciConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_abci_addr(),
            connection_limit: default_connection_limit(),
        }
    }
}

fn default_abci_addr() -> String {
    "tcp://0.0.0.0:46658".to_string()
}

fn default_connection_limit() -> usize {
    16
}

/// Downstream application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Address of the downstream application
    #[serde(default = "default_downstream_addr")]
    pub addr: String,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Connection attempts at startup
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Delay between connection attempts in milliseconds
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,

    /// Transactions starting with this prefix are echoed back locally.
    /// Empty disables.
    #[serde(default)]
    pub echo_prefix: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            addr: default_downstream_addr(),
            timeout_ms: default_timeout_ms(),
            connect_retries: default_connect_retries(),
            retry_interval_ms: default_retry_interval_ms(),
            echo_prefix: String::new(),
        }
    }
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn echo_prefix(&self) -> Option<&[u8]> {
        if self.echo_prefix.is_empty() {
            None
        } else {
            Some(self.echo_prefix.as_bytes())
        }
    }
}

fn default_downstream_addr() -> String {
    "tcp://127.0.0.1:46659".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_connect_retries() -> u32 {
    30
}

fn default_retry_interval_ms() -> u64 {
    500
}

/// Control-plane configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Serve the control plane
    #[serde(default = "default_rpc_enabled")]
    pub enabled: bool,

    /// Control-plane HTTP listen address
    #[serde(default = "default_rpc_addr")]
    pub listen_addr: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            enabled: default_rpc_enabled(),
            listen_addr: default_rpc_addr(),
        }
    }
}

fn default_rpc_enabled() -> bool {
    true
}

fn default_rpc_addr() -> String {
    "tcp://0.0.0.0:46660".to_string()
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Bound of the intake queue
    #[serde(default = "default_intake_capacity")]
    pub intake_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            intake_capacity: default_intake_capacity(),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        SchedulerConfig::default().with_intake_capacity(settings.intake_capacity)
    }
}

fn default_intake_capacity() -> usize {
    DEFAULT_INTAKE_CAPACITY
}

impl ProxyConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Strip an optional `tcp://` scheme, leaving `host:port`.
pub fn tcp_address(addr: &str) -> Result<&str, ConfigError> {
    match addr.split_once("://") {
        None => Ok(addr),
        Some(("tcp", rest)) => Ok(rest),
        Some(_) => Err(ConfigError::UnsupportedScheme(addr.to_string())),
    }
}
