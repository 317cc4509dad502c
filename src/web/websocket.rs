//! Viewer WebSocket sessions
//!
//! A successful upgrade registers the connection with the hub and then
//! forwards its outbound channel to the socket. The hub owns the
//! connection for its lifetime; this task only holds the identity handle it
//! needs to unregister on the way out.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::broadcast::BroadcastHub;
use crate::web::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| viewer_session(socket, hub))
}

async fn viewer_session(mut socket: WebSocket, hub: Arc<BroadcastHub>) {
    // Registration queues the stream header ahead of any chunk.
    let Some((id, mut rx)) = hub.register() else {
        // Shutting down: no new viewers.
        let _ = socket.send(Message::Close(None)).await;
        return;
    };

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(bytes) => {
                    if sink.send(Message::Binary(bytes.to_vec())).await.is_err() {
                        break;
                    }
                }
                // Hub dropped us: backlog overflow or shutdown.
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(_)) => break,
                // Viewers only listen; anything else is ignored.
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unregister(id);
    tracing::debug!(viewer = %id, "viewer session ended");
}
