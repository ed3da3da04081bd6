//! Persistent chat channel over WebSocket.
//!
//! Each connection runs one loop that both forwards frames queued for its
//! session and reads client frames. Queries are handed to the gateway and
//! answered asynchronously, so a slow upstream never stalls this loop.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use advisor_chat::ServerFrame;

use crate::state::AppState;

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut ws: WebSocket, state: AppState) {
    let (tx, mut outbound) = mpsc::unbounded_channel::<ServerFrame>();
    let handle = state.gateway.open_session(tx);
    info!(session_id = %handle.id, "WebSocket connected");

    loop {
        tokio::select! {
            Some(frame) = outbound.recv() => {
                if send_frame(&mut ws, &frame).await.is_err() {
                    break;
                }
            }

            incoming = recv_message(&mut ws) => {
                match incoming {
                    Some(Ok(text)) => state.gateway.handle_message(&handle, &text),
                    Some(Err(())) | None => break,
                }
            }
        }
    }

    let id = handle.id;
    state.gateway.close_session(handle);
    info!(session_id = %id, "WebSocket disconnected");
}

/// Next text frame; `Err` on close or transport error, `None` at end of stream.
async fn recv_message(ws: &mut WebSocket) -> Option<Result<String, ()>> {
    loop {
        match ws.recv().await {
            Some(Ok(Message::Text(text))) => return Some(Ok(text.to_string())),
            Some(Ok(Message::Close(_))) => return Some(Err(())),
            Some(Ok(_)) => {
                // Pings are answered by axum; binary frames are ignored.
                continue;
            }
            Some(Err(e)) => {
                debug!(error = %e, "WebSocket receive error");
                return Some(Err(()));
            }
            None => return None,
        }
    }
}

async fn send_frame(ws: &mut WebSocket, frame: &ServerFrame) -> Result<(), ()> {
    let json = serde_json::to_string(frame).map_err(|e| {
        warn!(error = %e, "Failed to encode frame");
    })?;
    ws.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(error = %e, "WebSocket send error");
    })
}
