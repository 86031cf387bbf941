use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, Utf8Bytes};
use relay_core::auth_token::TokenVerifier;
use relay_core::protocol::ServerMessage;
use relay_core::session::{FrameOutcome, Session};
use relay_core::types::{new_conn_id, ConnId};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::ws::heartbeat::HeartbeatScheduler;
use crate::ws::registry::ConnectionRegistry;

/// What the socket task should do after a frame has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAction {
    Continue,
    Close,
}

/// The relay service: connection registry, heartbeat and claim verifier.
///
/// Constructed once at startup and shared through `AppState`. Every
/// membership change goes through [`connect`](Self::connect) and
/// [`disconnect`](Self::disconnect) so the heartbeat follows the count.
pub struct RelayHub {
    registry: Arc<ConnectionRegistry>,
    heartbeat: HeartbeatScheduler,
    verifier: TokenVerifier,
    /// Pre-rendered `opt` message; the options document never changes.
    options_frame: Utf8Bytes,
}

impl RelayHub {
    pub fn new(
        verifier: TokenVerifier,
        options: Value,
        heartbeat_interval: Duration,
    ) -> Result<Self, serde_json::Error> {
        let registry = Arc::new(ConnectionRegistry::new());
        let options_frame = ServerMessage::Opt { options }.to_json()?.into();

        Ok(Self {
            heartbeat: HeartbeatScheduler::new(Arc::clone(&registry), heartbeat_interval),
            registry,
            verifier,
            options_frame,
        })
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn heartbeat(&self) -> &HeartbeatScheduler {
        &self.heartbeat
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// Register a new connection and start the heartbeat if it is the first.
    pub async fn connect(&self) -> (ConnId, mpsc::UnboundedReceiver<Message>) {
        let conn_id = new_conn_id();
        let (rx, change) = self.registry.add(conn_id.clone()).await;
        tracing::info!(conn_id = %conn_id, clients = change.after, "Connection opened");

        self.heartbeat.on_membership_change(change).await;
        (conn_id, rx)
    }

    /// Deregister a connection and stop the heartbeat if it was the last.
    pub async fn disconnect(&self, conn_id: &str) {
        let change = self.registry.remove(conn_id).await;
        tracing::info!(conn_id, clients = change.after, "Connection closed");

        self.heartbeat.on_membership_change(change).await;
    }

    /// Run one inbound frame through the connection's session.
    pub async fn handle_frame(
        &self,
        conn_id: &str,
        session: &mut Session,
        frame: &[u8],
    ) -> FrameAction {
        match session.on_frame(frame, &self.verifier) {
            FrameOutcome::HeartbeatReply => {
                tracing::trace!(conn_id, "Heartbeat reply");
                FrameAction::Continue
            }
            FrameOutcome::Authenticated => {
                self.admit(conn_id).await;
                FrameAction::Continue
            }
            FrameOutcome::Rejected(reason) => {
                tracing::debug!(conn_id, %reason, "Claim rejected");
                tracing::info!(conn_id, "Client auth failed, closing");
                self.reject(conn_id).await;
                FrameAction::Close
            }
            FrameOutcome::Relay(payload) => {
                let delivered = self.relay(conn_id, payload).await;
                tracing::trace!(conn_id, delivered, "Payload relayed");
                FrameAction::Continue
            }
            FrameOutcome::Dropped(e) => {
                tracing::debug!(conn_id, error = %e, "Dropping unparseable payload");
                FrameAction::Continue
            }
            FrameOutcome::Ignored => FrameAction::Close,
        }
    }

    /// Wrap `payload` in a `td` envelope and send it to every connection
    /// except `sender`. Returns the number of deliveries.
    pub async fn relay(&self, sender: &str, payload: Value) -> usize {
        match ServerMessage::relay(payload).to_json() {
            Ok(text) => {
                self.registry
                    .broadcast(sender, Message::Text(text.into()), false)
                    .await
            }
            Err(e) => {
                tracing::warn!(conn_id = sender, error = %e, "Failed to encode relay envelope");
                0
            }
        }
    }

    /// Close every connection and stop the heartbeat.
    pub async fn shutdown(&self) -> usize {
        let closed = self.registry.shutdown_all().await;
        self.heartbeat.stop().await;
        closed
    }

    async fn admit(&self, conn_id: &str) {
        self.registry.mark_authenticated(conn_id).await;
        self.send_message(conn_id, &ServerMessage::AuthOk).await;
        self.registry
            .send_to(conn_id, Message::Text(self.options_frame.clone()))
            .await;
        tracing::info!(conn_id, "Client authenticated");
    }

    async fn reject(&self, conn_id: &str) {
        self.send_message(conn_id, &ServerMessage::AuthFail).await;
        self.registry.send_to(conn_id, Message::Close(None)).await;
    }

    async fn send_message(&self, conn_id: &str, message: &ServerMessage) -> bool {
        match message.to_json() {
            Ok(text) => self.registry.send_to(conn_id, Message::Text(text.into())).await,
            Err(e) => {
                tracing::warn!(conn_id, error = %e, "Failed to encode server message");
                false
            }
        }
    }
}
