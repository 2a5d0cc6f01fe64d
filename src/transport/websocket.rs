//! WebSocket transport
//!
//! Each payload is written verbatim as one frame: a text frame when it is
//! valid UTF-8, a binary frame otherwise. Frames from the client are
//! ignored apart from close. Any write or read failure ends the relay, and
//! every exit path releases the subscription.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use crate::broker::{Message, TransportKind};
use crate::transport::server::AppState;

/// `GET /ws-streaming/{route}/{topics}`
pub async fn stream(
    ws: WebSocketUpgrade,
    Path((route, topics)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| relay(socket, state, route, topics))
}

async fn relay(socket: WebSocket, state: AppState, route: String, topics: String) {
    let mut subscription = match state.manager.open(&route, &topics).await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("failed to open WS subscription: {e}");
            return;
        }
    };
    let _guard = state.counters.connection_opened(TransportKind::WebSocket);
    let id = subscription.id();
    info!("CONNECT WS | {id} | {route}/{topics}");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    loop {
        tokio::select! {
            message = subscription.recv() => {
                let Some(message) = message else { break };
                if let Err(e) = ws_sender.send(frame(&message)).await {
                    warn!("failed to send message to {id}: {e}");
                    break;
                }
            }
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("read error from {id}: {e}");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    info!("DISCONNECT WS | {id} | {route}/{topics}");
    if let Err(e) = subscription.close().await {
        warn!("failed to release subscription {id}: {e}");
    }
}

pub(crate) fn frame(message: &Message) -> WsMessage {
    match std::str::from_utf8(&message.payload) {
        Ok(text) => WsMessage::Text(text.into()),
        Err(_) => WsMessage::Binary(message.payload.clone()),
    }
}
