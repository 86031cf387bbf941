//! Transport-independent building blocks of the relay: claim verification,
//! the wire protocol and the per-connection session state machine.

pub mod auth_token;
pub mod clock;
pub mod error;
pub mod protocol;
pub mod session;
pub mod types;
