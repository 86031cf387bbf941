use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_core::auth_token::TokenVerifier;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_api::config::{load_options_document, RunMode, ServerConfig};
use relay_api::router::{build_app_router, build_ws_router};
use relay_api::state::AppState;
use relay_api::ws::RelayHub;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid server configuration");
        std::process::exit(1);
    });
    tracing::info!(
        host = %config.host,
        port = config.port,
        mode = %config.mode,
        "Loaded server configuration"
    );

    let options = load_options_document(&config.options_path).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to load options document");
        std::process::exit(1);
    });
    tracing::info!(path = %config.options_path.display(), "Options document loaded");

    // --- Relay hub ---
    let verifier =
        TokenVerifier::new(config.ws_secret.as_bytes()).with_ttl(config.token_ttl_secs);
    let hub = RelayHub::new(
        verifier,
        options,
        Duration::from_secs(config.heartbeat_interval_secs),
    )
    .map(Arc::new)
    .unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to encode options message");
        std::process::exit(1);
    });

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        hub: Arc::clone(&hub),
    };

    // --- Development WebSocket listener ---
    let ws_server = match config.mode {
        RunMode::Production => None,
        RunMode::Development => {
            let ws_addr = SocketAddr::new(config.host, config.ws_port);
            let ws_listener = tokio::net::TcpListener::bind(ws_addr)
                .await
                .expect("Failed to bind WebSocket address");
            tracing::info!(%ws_addr, "Starting WebSocket listener");

            let ws_app = build_ws_router(state.clone());
            Some(tokio::spawn(async move {
                if let Err(e) = axum::serve(ws_listener, ws_app).await {
                    tracing::error!(error = %e, "WebSocket listener failed");
                }
            }))
        }
    };

    // --- Start server ---
    let app = build_app_router(state, &config);
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, mode = %config.mode, "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    if let Some(handle) = ws_server {
        handle.abort();
        tracing::info!("WebSocket listener stopped");
    }

    let closed = hub.shutdown().await;
    tracing::info!(closed, "Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
