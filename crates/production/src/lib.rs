//! ABCI proxy with on-the-fly validator set changes.
//!
//! The proxy sits between a consensus engine and its application. Every
//! protocol call is forwarded unchanged, except end-block, where validator
//! updates scheduled for that height through the control plane are appended
//! to the application's own diffs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  ABCI   ┌───────────────────────────────────────┐  ABCI   ┌─────────────┐
//! │ Consensus engine │────────►│ AbciServer                            │────────►│ Downstream  │
//! └──────────────────┘         │   └─ ProxyApplication<SocketClient>   │         │ application │
//!                              │        └─ ValidatorScheduler          │         └─────────────┘
//!                              │              ▲ bounded mpsc + height  │
//! ┌──────────────────┐  HTTP   │              │                        │
//! │ Operator         │────────►│ RpcServer (SchedulerHandle)           │
//! └──────────────────┘   ws    └───────────────────────────────────────┘
//! ```
//!
//! The engine's connections are serialized through a single application lock,
//! so the scheduler's pending table is only ever touched by one protocol
//! call at a time. The control plane never sees the table; it submits through
//! a [`SchedulerHandle`](abci_proxy_scheduler::SchedulerHandle).
//!
//! # Example
//!
//! ```no_run
//! use abci_proxy_production::{
//!     AbciServer, ClientConfig, ProxyApplication, ServerConfig, SocketClient,
//! };
//! use abci_proxy_production::rpc::{RpcServer, RpcServerConfig};
//! use abci_proxy_scheduler::{SchedulerConfig, ValidatorScheduler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let downstream = SocketClient::connect(ClientConfig::new("tcp://127.0.0.1:46659")).await?;
//! let (scheduler, handle) = ValidatorScheduler::new(SchedulerConfig::default());
//! let app = Arc::new(ProxyApplication::new(downstream, scheduler));
//!
//! let shutdown = CancellationToken::new();
//! RpcServer::new(RpcServerConfig::default(), handle)
//!     .start(shutdown.clone())
//!     .await?;
//! AbciServer::bind(&ServerConfig::default(), app)
//!     .await?
//!     .serve(shutdown)
//!     .await;
//! # Ok(())
//! # }
//! ```

mod application;
mod client;
pub mod codec;
pub mod config;
pub mod metrics;
mod proxy;
pub mod rpc;
mod server;
pub mod telemetry;

pub use application::{dispatch, AbciError, Application};
pub use client::{ClientConfig, SocketClient};
pub use config::{ConfigError, ProxyConfig};
pub use proxy::ProxyApplication;
pub use server::{AbciServer, ServerConfig, ServerError};
pub use telemetry::{init_telemetry, TelemetryConfig, TelemetryError};
