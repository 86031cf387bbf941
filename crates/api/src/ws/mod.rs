//! WebSocket relay infrastructure.
//!
//! Provides the connection registry, the membership-driven heartbeat, the
//! relay hub tying them together, and the HTTP upgrade handlers.

mod handler;
pub mod heartbeat;
pub mod hub;
pub mod registry;

pub use handler::{upgrade_or_greet, ws_handler};
pub use heartbeat::{HeartbeatScheduler, DEFAULT_HEARTBEAT_INTERVAL};
pub use hub::{FrameAction, RelayHub};
pub use registry::{ConnectionRegistry, MembershipChange};
