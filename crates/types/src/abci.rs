//! Application blockchain interface (ABCI) messages.
//!
//! These are the requests a consensus engine sends to its application and the
//! matching responses. Byte fields serialize as hex strings.

use crate::{BlockHeight, Validator};
use serde::{Deserialize, Serialize};

/// Result codes carried in transaction and commit responses.
pub mod code {
    pub const OK: u32 = 0;
    pub const INTERNAL_ERROR: u32 = 1;
    pub const ENCODING_ERROR: u32 = 2;
    pub const BAD_NONCE: u32 = 3;
    pub const UNAUTHORIZED: u32 = 4;
    pub const INSUFFICIENT_FUNDS: u32 = 5;
    pub const UNKNOWN_REQUEST: u32 = 6;
}

// ═══════════════════════════════════════════════════════════════════════════
// Envelopes
// ═══════════════════════════════════════════════════════════════════════════

/// A request from the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Request {
    Echo(RequestEcho),
    Flush,
    Info(RequestInfo),
    SetOption(RequestSetOption),
    DeliverTx(RequestDeliverTx),
    CheckTx(RequestCheckTx),
    Commit,
    Query(RequestQuery),
    InitChain(RequestInitChain),
    BeginBlock(RequestBeginBlock),
    EndBlock(RequestEndBlock),
}

impl Request {
    /// Method name, used for logging and metrics labels.
    pub fn method(&self) -> &'static str {
        match self {
            Request::Echo(_) => "echo",
            Request::Flush => "flush",
            Request::Info(_) => "info",
            Request::SetOption(_) => "set_option",
            Request::DeliverTx(_) => "deliver_tx",
            Request::CheckTx(_) => "check_tx",
            Request::Commit => "commit",
            Request::Query(_) => "query",
            Request::InitChain(_) => "init_chain",
            Request::BeginBlock(_) => "begin_block",
            Request::EndBlock(_) => "end_block",
        }
    }
}

/// A response to the consensus engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Response {
    /// The application failed to produce a response.
    Exception(ResponseException),
    Echo(ResponseEcho),
    Flush,
    Info(ResponseInfo),
    SetOption(ResponseSetOption),
    DeliverTx(ResponseDeliverTx),
    CheckTx(ResponseCheckTx),
    Commit(ResponseCommit),
    Query(ResponseQuery),
    InitChain(ResponseInitChain),
    BeginBlock(ResponseBeginBlock),
    EndBlock(ResponseEndBlock),
}

impl Response {
    /// Method name, used for logging and metrics labels.
    pub fn method(&self) -> &'static str {
        match self {
            Response::Exception(_) => "exception",
            Response::Echo(_) => "echo",
            Response::Flush => "flush",
            Response::Info(_) => "info",
            Response::SetOption(_) => "set_option",
            Response::DeliverTx(_) => "deliver_tx",
            Response::CheckTx(_) => "check_tx",
            Response::Commit(_) => "commit",
            Response::Query(_) => "query",
            Response::InitChain(_) => "init_chain",
            Response::BeginBlock(_) => "begin_block",
            Response::EndBlock(_) => "end_block",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Requests
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEcho {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSetOption {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDeliverTx {
    #[serde(with = "crate::serde_hex")]
    pub tx: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCheckTx {
    #[serde(with = "crate::serde_hex")]
    pub tx: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestQuery {
    #[serde(with = "crate::serde_hex", default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub prove: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInitChain {
    pub validators: Vec<Validator>,
}

/// Block header as seen by the application at begin-block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub chain_id: String,
    pub height: BlockHeight,
    /// Block time, seconds since the Unix epoch.
    pub time: u64,
    pub num_txs: u64,
    #[serde(with = "crate::serde_hex", default)]
    pub last_block_hash: Vec<u8>,
    #[serde(with = "crate::serde_hex", default)]
    pub app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBeginBlock {
    #[serde(with = "crate::serde_hex")]
    pub hash: Vec<u8>,
    pub header: Header,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEndBlock {
    pub height: BlockHeight,
}

// ═══════════════════════════════════════════════════════════════════════════
// Responses
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseException {
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEcho {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub last_block_height: BlockHeight,
    #[serde(with = "crate::serde_hex", default)]
    pub last_block_app_hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSetOption {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
}

/// Outcome of checking or delivering a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    #[serde(default)]
    pub code: u32,
    #[serde(with = "crate::serde_hex", default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub log: String,
}

impl TxResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn ok_with(data: Vec<u8>, log: impl Into<String>) -> Self {
        Self {
            code: code::OK,
            data,
            log: log.into(),
        }
    }

    pub fn error(code: u32, log: impl Into<String>) -> Self {
        Self {
            code,
            data: Vec::new(),
            log: log.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

pub type ResponseDeliverTx = TxResult;
pub type ResponseCheckTx = TxResult;
pub type ResponseCommit = TxResult;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseQuery {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub index: i64,
    #[serde(with = "crate::serde_hex", default)]
    pub key: Vec<u8>,
    #[serde(with = "crate::serde_hex", default)]
    pub value: Vec<u8>,
    #[serde(with = "crate::serde_hex", default)]
    pub proof: Vec<u8>,
    #[serde(default)]
    pub height: u64,
    #[serde(default)]
    pub log: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseInitChain {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBeginBlock {}

/// End-block response; `diffs` are the validator updates taking effect.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEndBlock {
    #[serde(default)]
    pub diffs: Vec<Validator>,
}
