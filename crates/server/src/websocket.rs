//! WebSocket handling for a session's single peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use agentlink_protocol::{ServerMessage, ServerNotification};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::debug_log::Direction;
use crate::dispatch::RequestContext;
use crate::notify::{OutboundMessage, Peer};
use crate::session::SessionShared;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const OUTBOUND_CAPACITY: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(shared): State<Arc<SessionShared>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, shared))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, shared: Arc<SessionShared>) {
    let conn_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let project = shared.project_root.clone();
    info!(
        component = "websocket",
        event = "ws.connection.opened",
        connection_id = conn_id,
        project = %project,
        "WebSocket connection opened"
    );

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_CAPACITY);

    // Spawn task to forward queued frames to the socket
    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let result = match msg {
                OutboundMessage::Text(json) => ws_tx.send(Message::Text(json.into())).await,
                OutboundMessage::Pong(data) => ws_tx.send(Message::Pong(data)).await,
                OutboundMessage::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            };

            if result.is_err() {
                debug!(
                    component = "websocket",
                    event = "ws.send.disconnected",
                    connection_id = conn_id,
                    "WebSocket send failed, client disconnected"
                );
                break;
            }
        }
    });

    let peer = Arc::new(Peer::new(conn_id, outbound_tx.clone()));
    if let Some(previous) = shared.notifier.attach(Arc::clone(&peer)) {
        info!(
            component = "websocket",
            event = "ws.connection.replaced",
            connection_id = conn_id,
            replaced_connection_id = previous.connection_id,
            "New connection replaces the previous peer"
        );
        previous.close();
    }

    // Greeting is unconditional and bound to this connection, even if a
    // newer one has already taken the slot.
    shared.notifier.send_to(
        &peer,
        ServerNotification::PluginMetadata {
            version: shared.version.clone(),
        },
    );
    shared.notifier.send_to(
        &peer,
        ServerNotification::VisibleFilesDidChange {
            uris: shared.editor.visible_files(&project),
        },
    );

    let mut ctx = RequestContext::new(conn_id, project.clone(), shared.auth_token.clone());

    loop {
        let next = tokio::select! {
            _ = peer.closed() => {
                info!(
                    component = "websocket",
                    event = "ws.connection.closed_by_server",
                    connection_id = conn_id,
                    "Connection closed by server"
                );
                break;
            }
            next = ws_rx.next() => next,
        };

        let text = match next {
            Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
            Some(Ok(Message::Ping(data))) => {
                let _ = outbound_tx.send(OutboundMessage::Pong(data)).await;
                continue;
            }
            Some(Ok(Message::Close(_))) => {
                info!(
                    component = "websocket",
                    event = "ws.connection.close_frame",
                    connection_id = conn_id,
                    "Client sent close frame"
                );
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!(
                    component = "websocket",
                    event = "ws.connection.error",
                    connection_id = conn_id,
                    error = %e,
                    "WebSocket error"
                );
                shared
                    .debug_log
                    .note(&project, &format!("transport error on connection {conn_id}: {e}"));
                break;
            }
            None => break,
        };

        shared.debug_log.record(Direction::Inbound, &project, &text);

        let response = match shared.dispatcher.handle_frame(&text, &mut ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    component = "websocket",
                    event = "ws.message.parse_failed",
                    connection_id = conn_id,
                    error = %e,
                    payload_bytes = text.len(),
                    payload_preview = %truncate_for_log(&text, 240),
                    "Dropping malformed client frame"
                );
                shared
                    .debug_log
                    .note(&project, &format!("dropped malformed frame: {e}"));
                continue;
            }
        };

        let json = match ServerMessage::from(response).encode() {
            Ok(json) => json,
            Err(e) => {
                error!(
                    component = "websocket",
                    event = "ws.send.serialize_failed",
                    connection_id = conn_id,
                    error = %e,
                    "Failed to serialize server response"
                );
                continue;
            }
        };
        shared.debug_log.record(Direction::Outbound, &project, &json);
        if outbound_tx.send(OutboundMessage::Text(json)).await.is_err() {
            break;
        }
    }

    shared.notifier.detach(conn_id);
    let _ = outbound_tx.try_send(OutboundMessage::Close);

    info!(
        component = "websocket",
        event = "ws.connection.closed",
        connection_id = conn_id,
        project = %project,
        "WebSocket connection closed"
    );
}

fn truncate_for_log(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
