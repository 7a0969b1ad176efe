//! `/ws`: a JSON relay shared by every connected client.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use nationgrid_protocol::WsMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Frames a slow client may fall behind before it starts skipping.
pub const RELAY_CAPACITY: usize = 256;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Fan-out of JSON text frames to all sockets.
#[derive(Debug, Clone)]
pub struct Relay {
    tx: broadcast::Sender<String>,
}

impl Relay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Forwards a client frame if it is JSON. Returns whether it was relayed.
    pub fn relay_text(&self, text: &str) -> bool {
        if serde_json::from_str::<serde_json::Value>(text).is_err() {
            return false;
        }
        // No subscribers is not an error.
        let _ = self.tx.send(text.to_string());
        true
    }

    pub fn publish(&self, msg: &WsMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                let _ = self.tx.send(json);
            }
            Err(e) => tracing::warn!(error = %e, "failed to encode ws message"),
        }
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new(RELAY_CAPACITY)
    }
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.relay.clone()))
}

async fn handle_socket(socket: WebSocket, relay: Relay) {
    let connection = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
    let (mut sender, mut receiver) = socket.split();
    let mut rx = relay.subscribe();

    tracing::info!(connection, "websocket connected");

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(connection, skipped, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !relay.relay_text(text.as_str()) {
                    tracing::warn!(connection, "dropped non-JSON websocket frame");
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection, error = %e, "websocket error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(connection, "websocket disconnected");
}
