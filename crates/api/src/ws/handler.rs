use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use relay_core::session::Session;

use crate::routes::health::ROOT_GREETING;
use crate::state::AppState;
use crate::ws::hub::{FrameAction, RelayHub};

/// How long a closing connection may take to flush its queued frames.
const SEND_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// `GET /` in production mode: upgrade requests become relay connections,
/// plain requests get the root greeting.
pub async fn upgrade_or_greet(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    match upgrade {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state.hub))
            .into_response(),
        Err(_) => ROOT_GREETING.into_response(),
    }
}

/// Manage a single relay connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the hub.
///   2. Spawns a sender task that forwards messages from the hub channel.
///   3. Runs inbound frames through the session state machine.
///   4. Deregisters on disconnect or rejected claim.
async fn handle_socket(socket: WebSocket, hub: Arc<RelayHub>) {
    let (conn_id, mut rx) = hub.connect().await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    let mut session = Session::new();

    // Receiver loop: frames are handled in arrival order.
    while let Some(result) = stream.next().await {
        let action = match result {
            Ok(Message::Text(text)) => {
                hub.handle_frame(&conn_id, &mut session, text.as_str().as_bytes())
                    .await
            }
            Ok(Message::Binary(data)) => hub.handle_frame(&conn_id, &mut session, &data).await,
            Ok(Message::Ping(_) | Message::Pong(_)) => FrameAction::Continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        if action == FrameAction::Close {
            break;
        }
    }

    session.close();
    hub.disconnect(&conn_id).await;

    // Deregistering dropped the channel sender, so the sender task ends once
    // it has flushed whatever was queued (e.g. `auth_fail` and Close).
    if tokio::time::timeout(SEND_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::debug!(conn_id = %conn_id, "WebSocket task finished");
}
