//! Route configuration for the control plane.

use super::handlers::*;
use super::state::RpcState;
use super::websocket::websocket_handler;
use axum::{
    routing::{get, post},
    Router,
};

/// Create the full router with all control-plane routes.
pub fn create_router(state: RpcState) -> Router {
    Router::new()
        // JSON-RPC request objects
        .route("/", post(jsonrpc_handler))
        // URI-style calls
        .route("/current_height", get(current_height_uri_handler))
        .route("/change_validators", get(change_validators_uri_handler))
        // Websocket JSON-RPC
        .route("/websocket/endpoint", get(websocket_handler))
        // Health and scraping
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
