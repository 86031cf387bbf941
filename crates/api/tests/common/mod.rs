#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use relay_api::config::{RunMode, ServerConfig};
use relay_api::router::{build_app_router, build_ws_router};
use relay_api::state::AppState;
use relay_api::ws::RelayHub;
use relay_core::auth_token::{sign_timestamp, TokenVerifier};

pub const TEST_SECRET: &str = "integration-test-secret";

/// How long a client waits for an expected frame.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a client listens to conclude nothing is coming.
pub const SILENCE_WINDOW: Duration = Duration::from_millis(250);

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(mode: RunMode) -> ServerConfig {
    ServerConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        mode,
        ws_port: 0,
        ws_secret: TEST_SECRET.to_string(),
        options_path: PathBuf::from("assets.json"),
        static_dir: PathBuf::from("does-not-exist"),
        token_ttl_secs: 300,
        heartbeat_interval_secs: 50,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// The options document handed to authenticated clients in tests.
pub fn test_options() -> Value {
    json!({ "palette": ["#ff0000", "#00ff00"], "maxPlayers": 4 })
}

pub fn build_state(config: ServerConfig) -> AppState {
    let verifier =
        TokenVerifier::new(config.ws_secret.as_bytes()).with_ttl(config.token_ttl_secs);
    let hub = RelayHub::new(
        verifier,
        test_options(),
        Duration::from_secs(config.heartbeat_interval_secs),
    )
    .expect("options should encode");

    AppState {
        config: Arc::new(config),
        hub: Arc::new(hub),
    }
}

/// Build the full HTTP router for `config`, mirroring `main.rs`.
pub fn build_test_app(config: ServerConfig) -> Router {
    let state = build_state(config.clone());
    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn assert_ok(response: &Response) {
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Live server helpers
// ---------------------------------------------------------------------------

/// Serve the production router on an ephemeral port.
pub async fn spawn_server() -> (SocketAddr, AppState) {
    let config = test_config(RunMode::Production);
    let state = build_state(config.clone());
    let app = build_app_router(state.clone(), &config);
    (serve(app).await, state)
}

/// Serve the development WebSocket-only router on an ephemeral port.
pub async fn spawn_dev_ws_server() -> (SocketAddr, AppState) {
    let state = build_state(test_config(RunMode::Development));
    let app = build_ws_router(state.clone());
    (serve(app).await, state)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("WebSocket handshake should succeed");
    client
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A claim for `timestamp`, correctly signed with [`TEST_SECRET`].
pub fn auth_claim(timestamp: i64) -> String {
    json!({
        "type": "auth",
        "timestamp": timestamp,
        "token": sign_timestamp(TEST_SECRET.as_bytes(), &timestamp.to_string()),
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Client helpers
// ---------------------------------------------------------------------------

pub async fn send_text(client: &mut Client, text: impl Into<String>) {
    client
        .send(WsMessage::Text(text.into()))
        .await
        .expect("send should succeed");
}

/// Next data or close frame, skipping transport-level ping/pong.
/// `None` means the stream ended.
pub async fn next_frame(client: &mut Client) -> Option<WsMessage> {
    loop {
        let next = tokio::time::timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame");
        match next {
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(msg)) => return Some(msg),
            Some(Err(_)) | None => return None,
        }
    }
}

pub async fn next_text(client: &mut Client) -> String {
    match next_frame(client).await {
        Some(WsMessage::Text(text)) => text,
        other => panic!("expected a text frame, got {other:?}"),
    }
}

pub async fn next_json(client: &mut Client) -> Value {
    serde_json::from_str(&next_text(client).await).expect("frame should be JSON")
}

/// Assert that no data frame arrives within [`SILENCE_WINDOW`].
pub async fn assert_silent(client: &mut Client) {
    if let Ok(Some(Ok(msg))) = tokio::time::timeout(SILENCE_WINDOW, client.next()).await {
        panic!("expected silence, got {msg:?}");
    }
}

/// Connect and complete the handshake, consuming `auth_ok` and `opt`.
pub async fn authenticated_client(addr: SocketAddr) -> Client {
    let mut client = connect(addr, "/").await;
    send_text(&mut client, auth_claim(now_secs())).await;
    assert_eq!(next_json(&mut client).await["type"], "auth_ok");
    assert_eq!(next_json(&mut client).await["type"], "opt");
    client
}

/// Poll until the registry reports `expected` connections.
pub async fn wait_for_connections(state: &AppState, expected: usize) {
    let registry = state.hub.registry();
    for _ in 0..100 {
        if registry.connection_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {expected} connections (now {})",
        registry.connection_count().await
    );
}
