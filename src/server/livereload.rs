//! Live reload over WebSocket
//!
//! Bundle rewrites are broadcast to every connected page. Stylesheet-only
//! changes are swapped in place; anything else forces a full reload.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ServerState;

/// Messages pushed to the reload client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReloadMessage {
    /// Connection established
    Connected,

    /// Full page reload required
    Reload { reason: String },

    /// Stylesheet updated, swap without reloading
    CssUpdate { path: String },
}

/// Handle a WebSocket upgrade on the reload endpoint.
pub async fn reload_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(|socket| handle_reload_socket(socket, state))
}

async fn handle_reload_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut reload_rx = state.reload_tx.subscribe();

    if let Ok(json) = serde_json::to_string(&ReloadMessage::Connected) {
        let _ = sender.send(Message::Text(json)).await;
    }

    let connected = {
        let mut clients = state.clients.lock();
        *clients += 1;
        *clients
    };
    debug!("reload client connected ({} active)", connected);

    // Forward broadcast messages to this client
    let send_task = tokio::spawn(async move {
        while let Ok(message) = reload_rx.recv().await {
            if let Ok(json) = serde_json::to_string(&message) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Drain the client side until it hangs up
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Close(_) => break,
                Message::Text(text) => debug!("reload client says: {}", text),
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    let remaining = {
        let mut clients = state.clients.lock();
        *clients = clients.saturating_sub(1);
        *clients
    };
    debug!("reload client disconnected ({} active)", remaining);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_serialize_with_kebab_case_tags() {
        let reload = serde_json::to_string(&ReloadMessage::Reload {
            reason: "bundle rewritten".to_string(),
        })
        .unwrap();
        assert!(reload.contains(r#""type":"reload""#));

        let css = serde_json::to_string(&ReloadMessage::CssUpdate {
            path: "app.bundle.css".to_string(),
        })
        .unwrap();
        assert!(css.contains(r#""type":"css-update""#));

        let connected = serde_json::to_string(&ReloadMessage::Connected).unwrap();
        assert!(connected.contains(r#""type":"connected""#));
    }
}
