//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use crate::app_state::AppState;

/// `GET /ws` — Upgrade HTTP connection to WebSocket and hand it to the
/// dispatcher.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.max_message_size(state.max_frame_bytes)
        .on_upgrade(move |socket| async move { dispatcher.on_connect(socket).await })
}
