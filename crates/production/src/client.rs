//! Socket client for the downstream application.
//!
//! One framed TCP connection carries one request at a time. A connection that
//! fails or times out mid-call is dropped and redialed on the next call, so a
//! late response can never be read as the answer to a different request.

use crate::application::{AbciError, Application};
use crate::codec::{ClientCodec, CodecError};
use crate::config::{tcp_address, ConfigError};
use abci_proxy_types::abci::{
    Request, RequestBeginBlock, RequestCheckTx, RequestDeliverTx, RequestEndBlock,
    RequestInfo, RequestInitChain, RequestQuery, RequestSetOption, Response,
    ResponseBeginBlock, ResponseCheckTx, ResponseCommit, ResponseDeliverTx, ResponseEndBlock,
    ResponseInfo, ResponseInitChain, ResponseQuery, ResponseSetOption,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

type Connection = Framed<TcpStream, ClientCodec>;

/// Connection settings for [`SocketClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Downstream address, optionally `tcp://`-prefixed.
    pub addr: String,
    /// Bound on each call, including reconnection.
    pub timeout: Duration,
    /// Attempts made by [`SocketClient::connect`].
    pub connect_retries: u32,
    pub retry_interval: Duration,
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(10),
            connect_retries: 30,
            retry_interval: Duration::from_millis(500),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32, interval: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_interval = interval;
        self
    }
}

/// [`Application`] implementation that forwards every call over a socket.
pub struct SocketClient {
    addr: String,
    config: ClientConfig,
    conn: Mutex<Option<Connection>>,
}

impl SocketClient {
    /// Connect to the downstream application, retrying up to
    /// `connect_retries` times.
    pub async fn connect(config: ClientConfig) -> Result<Self, AbciError> {
        let addr = tcp_address(&config.addr)
            .map_err(|e: ConfigError| {
                AbciError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
            })?
            .to_string();

        let attempts = config.connect_retries.max(1);
        let mut attempt = 1;
        let stream = loop {
            match TcpStream::connect(&addr).await {
                Ok(stream) => break stream,
                Err(e) if attempt < attempts => {
                    warn!(
                        addr = %addr,
                        attempt,
                        attempts,
                        error = %e,
                        "Downstream application not reachable, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(config.retry_interval).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nodelay(true)?;
        info!(addr = %addr, "Connected to downstream application");

        Ok(Self {
            addr,
            conn: Mutex::new(Some(Framed::new(stream, ClientCodec::new()))),
            config,
        })
    }

    /// Address of the downstream application, without scheme.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send `request` and wait for its response.
    ///
    /// A [`Response::Exception`] from the downstream is returned as a
    /// response, not an error; the typed methods convert it.
    pub async fn call(&self, request: Request) -> Result<Response, AbciError> {
        let method = request.method();
        let mut guard = self.conn.lock().await;

        let result =
            tokio::time::timeout(self.config.timeout, exchange(&mut guard, &self.addr, request))
                .await;

        let result = match result {
            Ok(inner) => inner,
            Err(_) => Err(AbciError::Timeout {
                method,
                timeout: self.config.timeout,
            }),
        };

        if let Err(e) = &result {
            warn!(method, addr = %self.addr, error = %e, "Dropping downstream connection");
            *guard = None;
        }
        result
    }
}

/// One request/response round trip, dialing first if the slot is empty.
async fn exchange(
    slot: &mut Option<Connection>,
    addr: &str,
    request: Request,
) -> Result<Response, AbciError> {
    if slot.is_none() {
        debug!(addr = %addr, "Reconnecting to downstream application");
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        *slot = Some(Framed::new(stream, ClientCodec::new()));
    }
    let Some(conn) = slot.as_mut() else {
        return Err(AbciError::Disconnected(addr.to_string()));
    };

    conn.send(request).await?;
    match conn.next().await {
        Some(frame) => Ok(frame?.map_err(CodecError::Json)?),
        None => Err(AbciError::Disconnected(addr.to_string())),
    }
}

fn unexpected(expected: &'static str, got: Response) -> AbciError {
    match got {
        Response::Exception(e) => AbciError::Exception(e.error),
        other => AbciError::UnexpectedResponse {
            expected,
            got: other.method(),
        },
    }
}

#[async_trait]
impl Application for SocketClient {
    async fn info(&self, request: RequestInfo) -> Result<ResponseInfo, AbciError> {
        match self.call(Request::Info(request)).await? {
            Response::Info(r) => Ok(r),
            other => Err(unexpected("info", other)),
        }
    }

    async fn set_option(&self, request: RequestSetOption) -> Result<ResponseSetOption, AbciError> {
        match self.call(Request::SetOption(request)).await? {
            Response::SetOption(r) => Ok(r),
            other => Err(unexpected("set_option", other)),
        }
    }

    async fn deliver_tx(&self, request: RequestDeliverTx) -> Result<ResponseDeliverTx, AbciError> {
        match self.call(Request::DeliverTx(request)).await? {
            Response::DeliverTx(r) => Ok(r),
            other => Err(unexpected("deliver_tx", other)),
        }
    }

    async fn check_tx(&self, request: RequestCheckTx) -> Result<ResponseCheckTx, AbciError> {
        match self.call(Request::CheckTx(request)).await? {
            Response::CheckTx(r) => Ok(r),
            other => Err(unexpected("check_tx", other)),
        }
    }

    async fn commit(&self) -> Result<ResponseCommit, AbciError> {
        match self.call(Request::Commit).await? {
            Response::Commit(r) => Ok(r),
            other => Err(unexpected("commit", other)),
        }
    }

    async fn query(&self, request: RequestQuery) -> Result<ResponseQuery, AbciError> {
        match self.call(Request::Query(request)).await? {
            Response::Query(r) => Ok(r),
            other => Err(unexpected("query", other)),
        }
    }

    async fn init_chain(&self, request: RequestInitChain) -> Result<ResponseInitChain, AbciError> {
        match self.call(Request::InitChain(request)).await? {
            Response::InitChain(r) => Ok(r),
            other => Err(unexpected("init_chain", other)),
        }
    }

    async fn begin_block(
        &self,
        request: RequestBeginBlock,
    ) -> Result<ResponseBeginBlock, AbciError> {
        match self.call(Request::BeginBlock(request)).await? {
            Response::BeginBlock(r) => Ok(r),
            other => Err(unexpected("begin_block", other)),
        }
    }

    async fn end_block(&self, request: RequestEndBlock) -> Result<ResponseEndBlock, AbciError> {
        match self.call(Request::EndBlock(request)).await? {
            Response::EndBlock(r) => Ok(r),
            other => Err(unexpected("end_block", other)),
        }
    }
}
