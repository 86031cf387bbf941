use std::collections::HashMap;

use axum::extract::ws::Message;
use relay_core::protocol::HEARTBEAT_PROBE;
use relay_core::types::{ConnId, Timestamp};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single live connection.
pub struct WsConnection {
    /// Set once the connection has presented a valid claim.
    pub authenticated: bool,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// When this connection was established.
    pub connected_at: Timestamp,
}

impl WsConnection {
    /// Best-effort send. Closed channels are skipped and errors discarded:
    /// the connection is being torn down and will be removed by its own task.
    fn try_send(&self, message: Message) -> bool {
        if self.sender.is_closed() {
            return false;
        }
        self.sender.send(message).is_ok()
    }
}

/// Connection count before and after a single add or remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipChange {
    pub before: usize,
    pub after: usize,
}

impl MembershipChange {
    /// The registry went from empty to one connection.
    pub fn is_first_join(&self) -> bool {
        self.before == 0 && self.after == 1
    }

    /// The registry went from one connection to empty.
    pub fn is_last_leave(&self) -> bool {
        self.before == 1 && self.after == 0
    }
}

/// The live set of relay connections.
///
/// Thread-safe via interior `RwLock`: add/remove take the write lock, sweeps
/// (broadcast, heartbeat) take the read lock, so a sweep always sees a whole
/// membership snapshot. The connection count is the map length.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnId, WsConnection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new, unauthenticated connection.
    ///
    /// Returns the receiver half of the outbound channel and the resulting
    /// membership change. Re-adding an existing ID replaces it.
    pub async fn add(
        &self,
        conn_id: ConnId,
    ) -> (mpsc::UnboundedReceiver<Message>, MembershipChange) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            authenticated: false,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };

        let mut conns = self.connections.write().await;
        let before = conns.len();
        conns.insert(conn_id, conn);
        let change = MembershipChange {
            before,
            after: conns.len(),
        };
        (rx, change)
    }

    /// Remove a connection by its ID. Unknown IDs leave the count unchanged.
    pub async fn remove(&self, conn_id: &str) -> MembershipChange {
        let mut conns = self.connections.write().await;
        let before = conns.len();
        conns.remove(conn_id);
        MembershipChange {
            before,
            after: conns.len(),
        }
    }

    /// Flag a connection as authenticated. Returns `false` if it is gone.
    pub async fn mark_authenticated(&self, conn_id: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.authenticated = true;
                true
            }
            None => false,
        }
    }

    pub async fn is_authenticated(&self, conn_id: &str) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.authenticated)
    }

    /// Send a message to a single connection.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.try_send(message))
    }

    /// Fan a message out over the current membership.
    ///
    /// With `include_sender == false` every member except `sender` receives
    /// it. Recipients are not filtered by authentication state. Members whose
    /// channel is closed are skipped. Returns the number of deliveries.
    pub async fn broadcast(&self, sender: &str, message: Message, include_sender: bool) -> usize {
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for (id, conn) in conns.iter() {
            if !include_sender && id == sender {
                continue;
            }
            if conn.try_send(message.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send the heartbeat probe to every open connection.
    pub async fn ping_all(&self) -> usize {
        let probe = Message::Text(HEARTBEAT_PROBE.into());
        let conns = self.connections.read().await;
        let mut probed = 0;
        for conn in conns.values() {
            if conn.try_send(probe.clone()) {
                probed += 1;
            }
        }
        probed
    }

    /// Return the current number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Return how many live connections have authenticated.
    pub async fn authenticated_count(&self) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.authenticated)
            .count()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown. Returns the number of connections that
    /// were registered.
    pub async fn shutdown_all(&self) -> usize {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            conn.try_send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all relay connections");
        count
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
