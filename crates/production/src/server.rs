//! ABCI socket server.
//!
//! The consensus engine opens several connections (mempool, consensus,
//! query). Requests from all of them are funnelled through one application
//! lock, so the application never sees two calls at once.

use crate::application::{dispatch, Application};
use crate::codec::{CodecError, ServerCodec};
use crate::config::{tcp_address, ConfigError};
use abci_proxy_types::abci::{Response, ResponseException};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors from the ABCI server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind ABCI listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Address(#[from] ConfigError),
}

/// Configuration for the ABCI server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on, optionally `tcp://`-prefixed.
    pub listen_addr: String,
    /// Maximum concurrent connections; extra connections are refused.
    pub connection_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "tcp://0.0.0.0:46658".to_string(),
            connection_limit: 16,
        }
    }
}

/// Serves an [`Application`] to consensus engine connections.
pub struct AbciServer<A> {
    listener: TcpListener,
    app: Arc<A>,
    app_lock: Arc<Mutex<()>>,
    connections: Arc<Semaphore>,
    connection_limit: usize,
}

impl<A: Application> AbciServer<A> {
    /// Bind the listener. Nothing is accepted until [`serve`](Self::serve).
    pub async fn bind(config: &ServerConfig, app: Arc<A>) -> Result<Self, ServerError> {
        let addr = tcp_address(&config.listen_addr)?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        let connection_limit = config.connection_limit.max(1);

        Ok(Self {
            listener,
            app,
            app_lock: Arc::new(Mutex::new(())),
            connections: Arc::new(Semaphore::new(connection_limit)),
            connection_limit,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(addr = %addr, "ABCI server listening");
        }

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "Failed to accept ABCI connection");
                    continue;
                }
            };

            let Ok(permit) = self.connections.clone().try_acquire_owned() else {
                warn!(
                    peer = %peer,
                    limit = self.connection_limit,
                    "Connection limit reached, refusing ABCI connection"
                );
                continue;
            };

            let app = self.app.clone();
            let app_lock = self.app_lock.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let _permit = permit;
                debug!(peer = %peer, "ABCI connection opened");
                match handle_connection(app, app_lock, stream, shutdown).await {
                    Ok(()) => debug!(peer = %peer, "ABCI connection closed"),
                    Err(e) => warn!(peer = %peer, error = %e, "ABCI connection failed"),
                }
            });
        }

        info!("ABCI server stopped");
    }

    /// Run [`serve`](Self::serve) on a new task.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.serve(shutdown))
    }
}

async fn handle_connection<A: Application>(
    app: Arc<A>,
    app_lock: Arc<Mutex<()>>,
    stream: TcpStream,
    shutdown: CancellationToken,
) -> Result<(), CodecError> {
    stream.set_nodelay(true)?;
    let mut framed = Framed::new(stream, ServerCodec::new());

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            next = framed.next() => next,
        };

        let response = match next {
            None => return Ok(()),
            Some(Err(e)) => return Err(e),
            Some(Ok(Ok(request))) => {
                let method = request.method();
                let response = {
                    let _guard = app_lock.lock().await;
                    dispatch(&*app, request).await
                };
                if let Response::Exception(e) = &response {
                    warn!(method, error = %e.error, "ABCI request failed");
                }
                response
            }
            Some(Ok(Err(e))) => {
                warn!(error = %e, "Malformed ABCI request");
                Response::Exception(ResponseException {
                    error: format!("invalid request: {}", e),
                })
            }
        };

        framed.send(response).await?;
    }
}
