//! Live per-payment result channel.
//!
//! On upgrade, replay whatever result is already known, then stream
//! subsequent events until the socket closes.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State as AxumState};
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub payment_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    AxumState(state): AxumState<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.payment_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, payment_id: String) {
    let (cached, mut rx) = state.notify.subscribe(&payment_id);

    if let Some(result) = cached {
        if let Ok(text) = serde_json::to_string(&result) {
            if socket.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
    }

    while let Some(result) = rx.recv().await {
        let Ok(text) = serde_json::to_string(&result) else {
            continue;
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }

    debug!(payment_id = %payment_id, "websocket subscriber disconnected");
}
