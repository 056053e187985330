//! JSON-RPC over websocket.
//!
//! Every text frame is one JSON-RPC request and gets exactly one text frame
//! back, in order.

use super::handlers::handle_payload;
use super::state::RpcState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tracing::debug;

/// Handler for `GET /websocket/endpoint`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<RpcState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: RpcState) {
    debug!("Websocket client connected");

    while let Some(message) = socket.recv().await {
        let payload = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            // Pings are answered by axum; binary frames are not part of the API.
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Websocket receive failed");
                break;
            }
        };

        let reply = handle_text(&state, payload.as_str());
        if socket.send(Message::Text(reply.into())).await.is_err() {
            break;
        }
    }

    debug!("Websocket client disconnected");
}

fn handle_text(state: &RpcState, text: &str) -> String {
    let response = handle_payload(state, text.as_bytes());
    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(
            r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":-32603,"message":"Internal error","data":"{}"}}}}"#,
            e
        )
    })
}
