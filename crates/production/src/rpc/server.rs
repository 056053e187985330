//! Control-plane server implementation.

use super::routes::create_router;
use super::state::RpcState;
use crate::config::{tcp_address, ConfigError};
use abci_proxy_scheduler::SchedulerHandle;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Errors from the RPC server.
#[derive(Debug, Error)]
pub enum RpcServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),

    #[error(transparent)]
    Address(#[from] ConfigError),
}

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Address to listen on, optionally `tcp://`-prefixed.
    pub listen_addr: String,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "tcp://0.0.0.0:46660".to_string(),
        }
    }
}

/// Handle for controlling a running RPC server.
pub struct RpcServerHandle {
    /// Task handle for the server.
    task: JoinHandle<()>,
    /// Bound address.
    local_addr: SocketAddr,
}

impl RpcServerHandle {
    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server to finish.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Control-plane server for scheduling validator set changes.
pub struct RpcServer {
    config: RpcServerConfig,
    state: RpcState,
}

impl RpcServer {
    /// Create a new RPC server submitting to `scheduler`.
    pub fn new(config: RpcServerConfig, scheduler: SchedulerHandle) -> Self {
        Self {
            config,
            state: RpcState::new(scheduler),
        }
    }

    /// Start the server and return a handle for control.
    ///
    /// The server stops accepting connections once `shutdown` is cancelled.
    pub async fn start(self, shutdown: CancellationToken) -> Result<RpcServerHandle, RpcServerError> {
        let addr = tcp_address(&self.config.listen_addr)?;
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "RPC server listening");

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await;
            if let Err(e) = result {
                error!(error = ?e, "RPC server error");
            }
        });

        Ok(RpcServerHandle { task, local_addr })
    }

    /// Start and serve until shutdown (convenience method).
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), RpcServerError> {
        let handle = self.start(shutdown).await?;
        let _ = handle.join().await;
        Ok(())
    }
}
