//! Control-plane server.
//!
//! Operators schedule validator set changes here; the proxy applies them at
//! the requested height.
//!
//! # JSON-RPC Methods
//!
//! - `change_validators(validators, scheduled_height)` - returns `{}`
//! - `current_height()` - returns `{"height": <last completed height>}`
//!
//! # Transports
//!
//! - `POST /` - JSON-RPC 2.0 request object
//! - `GET /current_height` - URI-style call
//! - `GET /change_validators?validators=<json>&scheduled_height=<n>` - URI-style call
//! - `GET /websocket/endpoint` - one JSON-RPC request per text frame
//!
//! # Health & Metrics
//!
//! - `GET /health` - Liveness check
//! - `GET /metrics` - Prometheus metrics in text format
//!
//! # Example
//!
//! ```no_run
//! use abci_proxy_production::rpc::{RpcServer, RpcServerConfig};
//! use abci_proxy_scheduler::{SchedulerConfig, ValidatorScheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (scheduler, handle) = ValidatorScheduler::new(SchedulerConfig::default());
//! let config = RpcServerConfig {
//!     listen_addr: "tcp://0.0.0.0:46660".to_string(),
//! };
//!
//! // The scheduler itself goes to the proxy application.
//! # drop(scheduler);
//! RpcServer::new(config, handle)
//!     .serve(CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod handlers;
mod routes;
mod server;
mod state;
mod types;
mod websocket;

pub use handlers::{handle_payload, handle_request};
pub use routes::create_router;
pub use server::{RpcServer, RpcServerConfig, RpcServerError, RpcServerHandle};
pub use state::RpcState;
pub use types::*;
