//! Per-connection state machine.
//!
//! A [`Session`] classifies each inbound frame and reports what the transport
//! layer must do about it. It performs no I/O itself.
//!
//! ```text
//! Unauthenticated --valid claim--> Authenticated
//!        |                               |
//!   invalid claim                  transport close
//!        v                               v
//!      Closed <------transport close---- +
//! ```

use serde_json::Value;

use crate::auth_token::TokenVerifier;
use crate::error::ClaimError;
use crate::protocol::is_heartbeat_reply;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

/// What the transport layer must do with a frame.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The client answered a heartbeat probe. Nothing to send.
    HeartbeatReply,
    /// The claim was valid. Send `auth_ok`, then the options document.
    Authenticated,
    /// The claim was invalid. Send `auth_fail`, then close.
    Rejected(ClaimError),
    /// A parsed payload to fan out to the other connections.
    Relay(Value),
    /// An authenticated client sent something unparseable. Drop it.
    Dropped(serde_json::Error),
    /// The session is already closed.
    Ignored,
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    /// Advance the state machine with one inbound frame.
    ///
    /// Text and binary frames are handled alike; `frame` is the raw payload.
    pub fn on_frame(&mut self, frame: &[u8], verifier: &TokenVerifier) -> FrameOutcome {
        match self.state {
            SessionState::Closed => FrameOutcome::Ignored,
            _ if is_heartbeat_reply(frame) => FrameOutcome::HeartbeatReply,
            SessionState::Unauthenticated => match verifier.check(frame) {
                Ok(()) => {
                    self.state = SessionState::Authenticated;
                    FrameOutcome::Authenticated
                }
                Err(reason) => {
                    self.state = SessionState::Closed;
                    FrameOutcome::Rejected(reason)
                }
            },
            SessionState::Authenticated => match serde_json::from_slice::<Value>(frame) {
                Ok(payload) => FrameOutcome::Relay(payload),
                Err(e) => FrameOutcome::Dropped(e),
            },
        }
    }

    /// Mark the transport as gone.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
