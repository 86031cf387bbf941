use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Plain-text body served at `/` for non-upgrade requests.
pub const ROOT_GREETING: &str = "Hello World!";

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Live relay connections.
    pub connections: usize,
    /// Live connections that have authenticated.
    pub authenticated: usize,
}

/// GET /health -- returns service status and relay membership.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.hub.registry();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        connections: registry.connection_count().await,
        authenticated: registry.authenticated_count().await,
    })
}

/// GET / -- trivial liveness response.
pub async fn greet() -> &'static str {
    ROOT_GREETING
}

/// Mount the health check route.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
