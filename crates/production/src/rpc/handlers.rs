//! HTTP request handlers for the control plane.

use super::state::RpcState;
use super::types::*;
use crate::metrics;
use abci_proxy_scheduler::ScheduleError;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
// JSON-RPC Dispatch
// ═══════════════════════════════════════════════════════════════════════════

/// Parse a raw JSON-RPC payload and execute it.
///
/// Shared by the HTTP and websocket transports.
pub fn handle_payload(state: &RpcState, payload: &[u8]) -> JsonRpcResponse {
    let value: Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            return JsonRpcResponse::failure(
                Value::Null,
                JsonRpcError::new(error_code::PARSE_ERROR, "Parse error").with_data(e.to_string()),
            );
        }
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let request: JsonRpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::new(error_code::INVALID_REQUEST, "Invalid request")
                    .with_data(e.to_string()),
            );
        }
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return JsonRpcResponse::failure(
            request.id,
            JsonRpcError::new(error_code::INVALID_REQUEST, "Invalid request")
                .with_data(format!("unsupported jsonrpc version {:?}", request.jsonrpc)),
        );
    }

    handle_request(state, request)
}

/// Execute a parsed JSON-RPC request.
pub fn handle_request(state: &RpcState, request: JsonRpcRequest) -> JsonRpcResponse {
    debug!(method = %request.method, id = %request.id, "RPC request");

    let result = match request.method.as_str() {
        "change_validators" => change_validators(state, request.params),
        "current_height" => current_height(state),
        other => Err(
            JsonRpcError::new(error_code::METHOD_NOT_FOUND, "Method not found")
                .with_data(other.to_string()),
        ),
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id, value),
        Err(error) => JsonRpcResponse::failure(request.id, error),
    }
}

fn change_validators(state: &RpcState, params: Value) -> Result<Value, JsonRpcError> {
    let params = ChangeValidatorsParams::from_value(params).map_err(|e| {
        metrics::record_malformed_change();
        JsonRpcError::new(error_code::INVALID_PARAMS, "Invalid params").with_data(e.to_string())
    })?;

    match state.scheduler.schedule(params.into_change()) {
        Ok(()) => {
            metrics::record_change_scheduled();
            to_result(ChangeValidatorsResult::default())
        }
        Err(e) => {
            metrics::record_change_rejected(&e);
            info!(error = %e, "Rejected validator set change");
            let code = match e {
                ScheduleError::PastHeight { .. } => error_code::INTERNAL_ERROR,
                ScheduleError::QueueFull { .. } | ScheduleError::Closed => {
                    error_code::SERVER_ERROR
                }
            };
            Err(JsonRpcError::new(code, e.to_string()))
        }
    }
}

fn current_height(state: &RpcState) -> Result<Value, JsonRpcError> {
    to_result(CurrentHeightResult {
        height: state.scheduler.current_height(),
    })
}

fn to_result<T: Serialize>(result: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| {
        JsonRpcError::new(error_code::INTERNAL_ERROR, "Internal error").with_data(e.to_string())
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON-RPC over HTTP
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `POST /` - JSON-RPC request object.
pub async fn jsonrpc_handler(State(state): State<RpcState>, body: Bytes) -> impl IntoResponse {
    Json(handle_payload(&state, &body))
}

/// Handler for `GET /current_height`.
pub async fn current_height_uri_handler(State(state): State<RpcState>) -> impl IntoResponse {
    let request = JsonRpcRequest::new(Value::Null, "current_height", Value::Null);
    Json(handle_request(&state, request))
}

/// Query string of `GET /change_validators`.
///
/// Values are JSON: `?validators=[{"pub_key":{...},"power":10}]&scheduled_height=5`.
#[derive(Debug, Default, Deserialize)]
pub struct ChangeValidatorsQuery {
    pub validators: Option<String>,
    pub scheduled_height: Option<String>,
}

/// Handler for `GET /change_validators`.
pub async fn change_validators_uri_handler(
    State(state): State<RpcState>,
    Query(query): Query<ChangeValidatorsQuery>,
) -> impl IntoResponse {
    let response = match uri_params(&query) {
        Ok(params) => {
            handle_request(&state, JsonRpcRequest::new(Value::Null, "change_validators", params))
        }
        Err(error) => {
            metrics::record_malformed_change();
            JsonRpcResponse::failure(Value::Null, error)
        }
    };
    Json(response)
}

fn uri_params(query: &ChangeValidatorsQuery) -> Result<Value, JsonRpcError> {
    let invalid = |detail: String| {
        JsonRpcError::new(error_code::INVALID_PARAMS, "Invalid params").with_data(detail)
    };

    let validators = query
        .validators
        .as_deref()
        .ok_or_else(|| invalid("missing validators".to_string()))?;
    let validators: Value = serde_json::from_str(validators)
        .map_err(|e| invalid(format!("validators: {}", e)))?;

    let height = query
        .scheduled_height
        .as_deref()
        .ok_or_else(|| invalid("missing scheduled_height".to_string()))?;
    let height: u64 = height
        .trim_matches('"')
        .parse()
        .map_err(|e| invalid(format!("scheduled_height: {}", e)))?;

    Ok(json!({
        "validators": validators,
        "scheduled_height": height,
    }))
}

// ═══════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════

/// Handler for `GET /health` - liveness check.
pub async fn health_handler(State(state): State<RpcState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for `GET /metrics` - Prometheus metrics.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = ?e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics".to_string(),
        )
            .into_response();
    }

    (
        [(
            axum::http::header::CONTENT_TYPE,
            encoder.format_type().to_string(),
        )],
        buffer,
    )
        .into_response()
}
