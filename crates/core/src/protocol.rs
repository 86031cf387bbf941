//! Wire messages exchanged between the relay and its clients.
//!
//! Structured messages are JSON objects tagged by a `type` field. The
//! heartbeat probe and its reply are bare text frames, not JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text frame the relay sends to probe liveness.
pub const HEARTBEAT_PROBE: &str = "ping";

/// Text frame a client sends back in answer to [`HEARTBEAT_PROBE`].
pub const HEARTBEAT_REPLY: &str = "pong";

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The authentication claim was accepted.
    AuthOk,
    /// The claim was rejected; the relay closes the connection next.
    AuthFail,
    /// Client options document, sent once right after `auth_ok`.
    Opt { options: Value },
    /// A payload relayed from another client, unchanged.
    Td { data: Value },
}

impl ServerMessage {
    /// Wrap a parsed client payload for fan-out.
    pub fn relay(data: Value) -> Self {
        Self::Td { data }
    }

    /// Serialize to the JSON text carried in a WebSocket frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Whether `frame` is exactly the heartbeat reply.
pub fn is_heartbeat_reply(frame: &[u8]) -> bool {
    frame == HEARTBEAT_REPLY.as_bytes()
}
