//! ABCI Proxy
//!
//! Sits between a consensus engine and its application, forwarding every
//! call and injecting validator set changes scheduled over the control plane.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: listen on tcp://0.0.0.0:46658, forward to tcp://127.0.0.1:46659
//! abci-proxy
//!
//! # Start with configuration file
//! abci-proxy --config proxy.toml
//!
//! # Override addresses
//! abci-proxy --addr tcp://0.0.0.0:26658 --proxy tcp://127.0.0.1:26659 --rpc-addr tcp://0.0.0.0:26660
//! ```
//!
//! See [`ProxyConfig`] for the configuration file format.

use abci_proxy_production::rpc::{RpcServer, RpcServerConfig};
use abci_proxy_production::{
    init_telemetry, AbciServer, ClientConfig, ProxyApplication, ProxyConfig, ServerConfig,
    SocketClient, TelemetryConfig,
};
use abci_proxy_scheduler::ValidatorScheduler;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// ABCI Proxy
///
/// Forwards ABCI calls to an application and applies validator set changes
/// scheduled through the control plane.
#[derive(Parser, Debug)]
#[command(name = "abci-proxy")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address for the consensus engine (overrides config)
    #[arg(long)]
    addr: Option<String>,

    /// Address of the downstream application (overrides config)
    #[arg(long)]
    proxy: Option<String>,

    /// Control-plane listen address (overrides config)
    #[arg(long)]
    rpc_addr: Option<String>,

    /// Echo transactions starting with this prefix instead of forwarding them
    #[arg(long)]
    echo_prefix: Option<String>,

    /// Log every forwarded call
    #[arg(short, long)]
    verbose: bool,

    /// Log level filter (overrides --verbose; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn load_config(&self) -> Result<ProxyConfig> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::load(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(ref addr) = self.addr {
            config.abci.listen_addr = addr.clone();
        }
        if let Some(ref proxy) = self.proxy {
            config.downstream.addr = proxy.clone();
        }
        if let Some(ref rpc_addr) = self.rpc_addr {
            config.rpc.listen_addr = rpc_addr.clone();
        }
        if let Some(ref prefix) = self.echo_prefix {
            config.downstream.echo_prefix = prefix.clone();
        }

        Ok(config)
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        let config = if self.verbose {
            TelemetryConfig::verbose()
        } else {
            TelemetryConfig::default()
        };
        match &self.log_level {
            Some(level) => config.with_filter(level.clone()),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(&cli.telemetry_config()).context("Failed to initialize logging")?;

    let config = cli.load_config()?;
    info!(
        listen = %config.abci.listen_addr,
        downstream = %config.downstream.addr,
        rpc = %config.rpc.listen_addr,
        rpc_enabled = config.rpc.enabled,
        "ABCI proxy starting, validator set changes are applied on the fly"
    );

    // Downstream application
    let client_config = ClientConfig::new(config.downstream.addr.clone())
        .with_timeout(config.downstream.timeout())
        .with_retries(
            config.downstream.connect_retries,
            config.downstream.retry_interval(),
        );
    let downstream = SocketClient::connect(client_config)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to downstream application at {}",
                config.downstream.addr
            )
        })?;

    // Scheduler and forwarder
    let (scheduler, handle) = ValidatorScheduler::new((&config.scheduler).into());
    let mut app = ProxyApplication::new(downstream, scheduler);
    if let Some(prefix) = config.downstream.echo_prefix() {
        info!(prefix = %config.downstream.echo_prefix, "Echo prefix enabled");
        app = app.with_echo_prefix(prefix);
    }
    let app = Arc::new(app);

    let shutdown = CancellationToken::new();

    // Control plane
    let rpc_handle = if config.rpc.enabled {
        let rpc_config = RpcServerConfig {
            listen_addr: config.rpc.listen_addr.clone(),
        };
        let handle = RpcServer::new(rpc_config, handle)
            .start(shutdown.clone())
            .await
            .context("Failed to start RPC server")?;
        Some(handle)
    } else {
        None
    };

    // Engine-facing server
    let server_config = ServerConfig {
        listen_addr: config.abci.listen_addr.clone(),
        connection_limit: config.abci.connection_limit,
    };
    let server = AbciServer::bind(&server_config, app)
        .await
        .context("Failed to start ABCI server")?;

    // Spawn shutdown signal handler
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C"),
            _ = terminate => info!("Received SIGTERM"),
        }

        info!("Initiating graceful shutdown...");
        signal_shutdown.cancel();
    });

    info!("ABCI proxy started, press Ctrl+C to stop");
    server.serve(shutdown).await;

    if let Some(handle) = rpc_handle {
        let _ = handle.join().await;
    }

    info!("ABCI proxy shutdown complete");
    Ok(())
}
