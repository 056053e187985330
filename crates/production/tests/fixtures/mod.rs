//! Shared fixtures for end-to-end tests.
//!
//! A [`TestNode`] runs a [`CounterApplication`] behind a full proxy (ABCI
//! server, socket client, scheduler, control plane) on fixed localhost ports
//! derived from the node ID. An [`EngineDriver`] plays the consensus engine.

#![allow(dead_code)]

use abci_proxy_production::rpc::{
    JsonRpcRequest, JsonRpcResponse, RpcServer, RpcServerConfig, RpcServerHandle,
};
use abci_proxy_production::{
    AbciError, AbciServer, Application, ClientConfig, ProxyApplication, ServerConfig,
    SocketClient,
};
use abci_proxy_scheduler::{SchedulerConfig, ValidatorScheduler};
use abci_proxy_types::abci::{
    code, Header, RequestBeginBlock, RequestCheckTx, RequestDeliverTx, RequestEndBlock,
    RequestInfo, RequestQuery, RequestSetOption, ResponseCheckTx, ResponseCommit,
    ResponseDeliverTx, ResponseEndBlock, ResponseInfo, ResponseQuery, ResponseSetOption,
    TxResult,
};
use abci_proxy_types::BlockHeight;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default wait for asynchronous effects in tests.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Intercepted calls
// ============================================================================

/// Records the arguments of every call to one application method.
pub struct InterceptedMethod<T> {
    name: &'static str,
    calls: Mutex<Vec<T>>,
    notify: Notify,
}

impl<T: Clone> InterceptedMethod<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            calls: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }

    pub fn notify(&self, args: T) {
        self.calls.lock().push(args);
        self.notify.notify_waiters();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<T> {
        self.calls.lock().clone()
    }

    /// Wait until at least `expected` calls were recorded.
    pub async fn wait_for(&self, expected: usize, timeout: Duration) -> Result<()> {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.count() >= expected {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.with_context(|| {
            format!(
                "{}: expected {} calls, got {}",
                self.name,
                expected,
                self.count()
            )
        })
    }
}

// ============================================================================
// Counter application
// ============================================================================

#[derive(Debug, Default)]
struct CounterState {
    hash_count: u64,
    tx_count: u64,
    serial: bool,
}

/// A counter application recording every call it receives.
///
/// In serial mode each transaction is a big-endian nonce of at most 8 bytes
/// that must equal the number of transactions delivered so far.
pub struct CounterApplication {
    state: Mutex<CounterState>,
    pub info_calls: InterceptedMethod<()>,
    pub set_option_calls: InterceptedMethod<(String, String)>,
    pub deliver_tx_calls: InterceptedMethod<Vec<u8>>,
    pub check_tx_calls: InterceptedMethod<Vec<u8>>,
    pub commit_calls: InterceptedMethod<()>,
    pub query_calls: InterceptedMethod<String>,
    pub end_block_calls: InterceptedMethod<BlockHeight>,
}

impl CounterApplication {
    pub fn new(serial: bool) -> Self {
        Self {
            state: Mutex::new(CounterState {
                serial,
                ..Default::default()
            }),
            info_calls: InterceptedMethod::new("info"),
            set_option_calls: InterceptedMethod::new("set_option"),
            deliver_tx_calls: InterceptedMethod::new("deliver_tx"),
            check_tx_calls: InterceptedMethod::new("check_tx"),
            commit_calls: InterceptedMethod::new("commit"),
            query_calls: InterceptedMethod::new("query"),
            end_block_calls: InterceptedMethod::new("end_block"),
        }
    }

    pub fn tx_count(&self) -> u64 {
        self.state.lock().tx_count
    }
}

fn decode_nonce(tx: &[u8]) -> std::result::Result<u64, TxResult> {
    if tx.len() > 8 {
        return Err(TxResult::error(
            code::ENCODING_ERROR,
            format!("Max tx size is 8 bytes, got {}", tx.len()),
        ));
    }
    let mut buf = [0u8; 8];
    buf[8 - tx.len()..].copy_from_slice(tx);
    Ok(u64::from_be_bytes(buf))
}

#[async_trait]
impl Application for CounterApplication {
    async fn info(&self, _request: RequestInfo) -> Result<ResponseInfo, AbciError> {
        self.info_calls.notify(());
        let state = self.state.lock();
        Ok(ResponseInfo {
            data: format!(
                "{{\"hashes\":{},\"txs\":{}}}",
                state.hash_count, state.tx_count
            ),
            ..Default::default()
        })
    }

    async fn set_option(&self, request: RequestSetOption) -> Result<ResponseSetOption, AbciError> {
        self.set_option_calls
            .notify((request.key.clone(), request.value.clone()));
        if request.key == "serial" && request.value == "on" {
            self.state.lock().serial = true;
        }
        Ok(ResponseSetOption::default())
    }

    async fn deliver_tx(&self, request: RequestDeliverTx) -> Result<ResponseDeliverTx, AbciError> {
        self.deliver_tx_calls.notify(request.tx.clone());
        let mut state = self.state.lock();
        if state.serial {
            let nonce = match decode_nonce(&request.tx) {
                Ok(nonce) => nonce,
                Err(result) => return Ok(result),
            };
            if nonce != state.tx_count {
                return Ok(TxResult::error(
                    code::BAD_NONCE,
                    format!("Invalid nonce. Expected {}, got {}", state.tx_count, nonce),
                ));
            }
        }
        state.tx_count += 1;
        Ok(TxResult::ok())
    }

    async fn check_tx(&self, request: RequestCheckTx) -> Result<ResponseCheckTx, AbciError> {
        self.check_tx_calls.notify(request.tx.clone());
        let state = self.state.lock();
        if state.serial {
            let nonce = match decode_nonce(&request.tx) {
                Ok(nonce) => nonce,
                Err(result) => return Ok(result),
            };
            if nonce < state.tx_count {
                return Ok(TxResult::error(
                    code::BAD_NONCE,
                    format!(
                        "Invalid nonce. Expected >= {}, got {}",
                        state.tx_count, nonce
                    ),
                ));
            }
        }
        Ok(TxResult::ok())
    }

    async fn commit(&self) -> Result<ResponseCommit, AbciError> {
        self.commit_calls.notify(());
        let mut state = self.state.lock();
        state.hash_count += 1;
        if state.tx_count == 0 {
            return Ok(TxResult::ok());
        }
        Ok(TxResult::ok_with(state.tx_count.to_be_bytes().to_vec(), ""))
    }

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AbciError> {
        self.query_calls.notify(request.path.clone());
        let state = self.state.lock();
        let response = match request.path.as_str() {
            "hash" => ResponseQuery {
                value: state.hash_count.to_string().into_bytes(),
                ..Default::default()
            },
            "tx" => ResponseQuery {
                value: state.tx_count.to_string().into_bytes(),
                ..Default::default()
            },
            other => ResponseQuery {
                log: format!("Invalid query path. Expected hash or tx, got {}", other),
                ..Default::default()
            },
        };
        Ok(response)
    }

    async fn end_block(&self, request: RequestEndBlock) -> Result<ResponseEndBlock, AbciError> {
        self.end_block_calls.notify(request.height);
        Ok(ResponseEndBlock::default())
    }
}

// ============================================================================
// Test node
// ============================================================================

pub const MAX_NODE_ID: u16 = 99;

/// The listeners of a test node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    /// Proxy listener the engine connects to.
    ProxyApp,
    /// Control plane.
    Rpc,
    /// Engine peer-to-peer address advertised to other nodes.
    P2p,
    /// Downstream application.
    App,
}

impl PortKind {
    fn base(self) -> u16 {
        match self {
            PortKind::ProxyApp => 50000,
            PortKind::Rpc => 50100,
            PortKind::P2p => 50200,
            PortKind::App => 50300,
        }
    }
}

struct Running {
    shutdown: CancellationToken,
    servers: Vec<JoinHandle<()>>,
    rpc: RpcServerHandle,
    proxy: Arc<ProxyApplication<SocketClient>>,
}

/// A counter application, its proxy and control plane on localhost.
pub struct TestNode {
    id: u16,
    app: Arc<CounterApplication>,
    peers: Vec<String>,
    running: Option<Running>,
}

impl TestNode {
    pub fn new(id: u16) -> Result<Self> {
        if id > MAX_NODE_ID {
            bail!("Maximum node id for tests is {}, got {}", MAX_NODE_ID, id);
        }
        Ok(Self {
            id,
            app: Arc::new(CounterApplication::new(false)),
            peers: Vec::new(),
            running: None,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn port(&self, kind: PortKind) -> u16 {
        kind.base() + self.id
    }

    fn tcp_addr(&self, kind: PortKind) -> String {
        format!("tcp://127.0.0.1:{}", self.port(kind))
    }

    pub fn p2p_addr(&self) -> String {
        format!("127.0.0.1:{}", self.port(PortKind::P2p))
    }

    pub fn rpc_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port(PortKind::Rpc))
    }

    pub fn app(&self) -> &Arc<CounterApplication> {
        &self.app
    }

    /// Addresses of the peers given to the last [`start`](Self::start).
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Height of the last end-block seen by the proxy.
    pub fn last_height(&self) -> Option<BlockHeight> {
        self.running.as_ref().map(|r| r.proxy.last_height())
    }

    /// Start the downstream application, the proxy and the control plane.
    pub async fn start(&mut self, peers: &[&TestNode]) -> Result<()> {
        if self.running.is_some() {
            bail!("node {} is already running", self.id);
        }
        self.peers = peers
            .iter()
            .filter(|peer| peer.id != self.id)
            .map(|peer| peer.p2p_addr())
            .collect();

        let shutdown = CancellationToken::new();

        let app_server = AbciServer::bind(
            &ServerConfig {
                listen_addr: self.tcp_addr(PortKind::App),
                connection_limit: 4,
            },
            self.app.clone(),
        )
        .await
        .context("failed to start downstream application")?;
        let app_task = app_server.spawn(shutdown.clone());

        let client = SocketClient::connect(
            ClientConfig::new(self.tcp_addr(PortKind::App))
                .with_timeout(WAIT_TIMEOUT)
                .with_retries(20, Duration::from_millis(50)),
        )
        .await
        .context("failed to connect to downstream application")?;

        let (scheduler, handle) = ValidatorScheduler::new(SchedulerConfig::default());
        let proxy = Arc::new(ProxyApplication::new(client, scheduler));

        let rpc = RpcServer::new(
            RpcServerConfig {
                listen_addr: self.tcp_addr(PortKind::Rpc),
            },
            handle,
        )
        .start(shutdown.clone())
        .await
        .context("failed to start control plane")?;

        let proxy_server = AbciServer::bind(
            &ServerConfig {
                listen_addr: self.tcp_addr(PortKind::ProxyApp),
                connection_limit: 4,
            },
            proxy.clone(),
        )
        .await
        .context("failed to start proxy")?;
        let proxy_task = proxy_server.spawn(shutdown.clone());

        self.running = Some(Running {
            shutdown,
            servers: vec![proxy_task, app_task],
            rpc,
            proxy,
        });
        Ok(())
    }

    /// Stop everything started by [`start`](Self::start).
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            bail!("node {} is not running", self.id);
        };
        running.shutdown.cancel();
        for server in running.servers {
            server.await?;
        }
        running.rpc.join().await?;
        Ok(())
    }

    /// Connect a fake consensus engine to this node's proxy.
    pub async fn engine(&self) -> Result<EngineDriver> {
        let client = SocketClient::connect(
            ClientConfig::new(self.tcp_addr(PortKind::ProxyApp))
                .with_timeout(WAIT_TIMEOUT)
                .with_retries(20, Duration::from_millis(50)),
        )
        .await?;
        Ok(EngineDriver {
            client,
            height: BlockHeight::GENESIS,
        })
    }
}

// ============================================================================
// Engine driver
// ============================================================================

/// Drives the block lifecycle through a proxy the way a consensus engine would.
pub struct EngineDriver {
    client: SocketClient,
    height: BlockHeight,
}

impl EngineDriver {
    pub fn client(&self) -> &SocketClient {
        &self.client
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    /// Run begin-block, deliver `txs`, end-block and commit for the next
    /// height. Returns the end-block response.
    pub async fn run_block(&mut self, txs: &[Vec<u8>]) -> Result<ResponseEndBlock> {
        let height = self.height.next();

        self.client
            .begin_block(RequestBeginBlock {
                hash: height.0.to_be_bytes().to_vec(),
                header: Header {
                    chain_id: "test-chain".to_string(),
                    height,
                    time: 1_500_000_000 + height.0,
                    num_txs: txs.len() as u64,
                    ..Default::default()
                },
            })
            .await?;
        for tx in txs {
            self.client
                .deliver_tx(RequestDeliverTx { tx: tx.clone() })
                .await?;
        }
        let end_block = self.client.end_block(RequestEndBlock { height }).await?;
        self.client.commit().await?;

        self.height = height;
        Ok(end_block)
    }
}

// ============================================================================
// Control plane client
// ============================================================================

/// Send a JSON-RPC request to the node's control plane.
pub async fn rpc_call(node: &TestNode, method: &str, params: Value) -> Result<JsonRpcResponse> {
    let request = JsonRpcRequest::new(1, method, params);
    let response = reqwest::Client::new()
        .post(node.rpc_url())
        .json(&request)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response)
}

/// Current height as reported by the control plane.
pub async fn current_height(node: &TestNode) -> Result<u64> {
    let response = rpc_call(node, "current_height", Value::Null).await?;
    let Some(result) = response.result else {
        bail!("current_height failed: {:?}", response.error);
    };
    result["height"]
        .as_u64()
        .context("current_height result has no height")
}
