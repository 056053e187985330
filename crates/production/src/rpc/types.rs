//! Request and response types for the control plane.

use abci_proxy_types::{BlockHeight, PublicKey, Validator, ValidatorSetChange};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC error codes.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    /// Also used for scheduling in the past.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// Scheduler back-pressure or shutdown.
    pub const SERVER_ERROR: i64 = -32000;
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON-RPC Envelope
// ═══════════════════════════════════════════════════════════════════════════

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(Value::String(data.into()));
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Methods
// ═══════════════════════════════════════════════════════════════════════════

/// A validator update as submitted on the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPowerChange {
    pub pub_key: PublicKey,
    pub power: u64,
}

impl From<&ValidatorPowerChange> for Validator {
    fn from(change: &ValidatorPowerChange) -> Self {
        Validator::new(&change.pub_key, change.power)
    }
}

/// Parameters of `change_validators`.
///
/// Accepted by name (`{"validators": [...], "scheduled_height": 5}`) or by
/// position (`[[...], 5]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeValidatorsParams {
    pub validators: Vec<ValidatorPowerChange>,
    pub scheduled_height: BlockHeight,
}

impl ChangeValidatorsParams {
    pub fn from_value(params: Value) -> Result<Self, serde_json::Error> {
        match params {
            Value::Array(_) => {
                let (validators, scheduled_height): (Vec<ValidatorPowerChange>, BlockHeight) =
                    serde_json::from_value(params)?;
                Ok(Self {
                    validators,
                    scheduled_height,
                })
            }
            other => serde_json::from_value(other),
        }
    }

    pub fn into_change(self) -> ValidatorSetChange {
        ValidatorSetChange::new(
            self.validators.iter().map(Validator::from).collect(),
            self.scheduled_height,
        )
    }
}

/// Result of `change_validators`: an empty object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeValidatorsResult {}

/// Result of `current_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentHeightResult {
    pub height: BlockHeight,
}

// ═══════════════════════════════════════════════════════════════════════════
// Health
// ═══════════════════════════════════════════════════════════════════════════

/// Response for `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub version: String,
}
