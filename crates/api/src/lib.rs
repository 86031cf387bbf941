//! Relay server library.
//!
//! Exposes the building blocks (config, state, router, WebSocket relay) so
//! integration tests and the binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
