//! Real-time channel: one WebSocket per session.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use recital_protocol::{ErrorInfo, MAX_MESSAGE_BYTES};
use tracing::debug;

use crate::state::SharedState;

/// Frames up to this size reach the parser, which answers anything above
/// `MAX_MESSAGE_BYTES` with `message_too_large`. Larger ones drop the socket.
const TRANSPORT_MAX_MESSAGE_BYTES: usize = MAX_MESSAGE_BYTES * 16;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<SharedState>>) -> Response {
    ws.max_message_size(TRANSPORT_MAX_MESSAGE_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<SharedState>) {
    let (id, mut outbound) = state.connect();
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(text) => {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => state.handle_text(id, text.as_str()),
                Some(Ok(Message::Binary(_))) => state.reject(id, ErrorInfo::invalid_message()),
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by axum.
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(session_id = id, error = %err, "WebSocket read failed");
                    break;
                }
            },
        }
    }

    state.disconnect(id);
}
