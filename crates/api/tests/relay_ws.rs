//! End-to-end relay tests over real WebSocket connections.
//!
//! Each test starts the production router on an ephemeral port and drives it
//! with `tokio-tungstenite` clients.

mod common;

use common::{
    assert_silent, auth_claim, authenticated_client, connect, next_frame, next_json, now_secs,
    send_text, spawn_dev_ws_server, spawn_server, test_options, wait_for_connections,
};
use futures::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message as WsMessage;

// ---------------------------------------------------------------------------
// Test: valid claim yields auth_ok then opt, in that order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_claim_receives_auth_ok_then_options() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr, "/").await;

    send_text(&mut client, auth_claim(now_secs())).await;

    assert_eq!(next_json(&mut client).await, json!({ "type": "auth_ok" }));
    assert_eq!(
        next_json(&mut client).await,
        json!({ "type": "opt", "options": test_options() })
    );
}

// ---------------------------------------------------------------------------
// Test: stale claim yields auth_fail and a server-side close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stale_claim_receives_auth_fail_then_close() {
    let (addr, state) = spawn_server().await;
    let mut client = connect(addr, "/").await;

    send_text(&mut client, auth_claim(now_secs() - 301)).await;

    assert_eq!(next_json(&mut client).await, json!({ "type": "auth_fail" }));
    match next_frame(&mut client).await {
        None | Some(WsMessage::Close(_)) => {}
        other => panic!("expected the server to close, got {other:?}"),
    }
    wait_for_connections(&state, 0).await;
}

// ---------------------------------------------------------------------------
// Test: payload before auth counts as a failed claim
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_before_auth_is_rejected() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr, "/").await;

    send_text(&mut client, r#"{"foo":1}"#).await;

    assert_eq!(next_json(&mut client).await["type"], "auth_fail");
}

// ---------------------------------------------------------------------------
// Test: heartbeat reply before auth is ignored
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pong_before_auth_is_ignored() {
    let (addr, _state) = spawn_server().await;
    let mut client = connect(addr, "/").await;

    send_text(&mut client, "pong").await;
    assert_silent(&mut client).await;

    send_text(&mut client, auth_claim(now_secs())).await;
    assert_eq!(next_json(&mut client).await["type"], "auth_ok");
}

// ---------------------------------------------------------------------------
// Test: payload reaches the other client, never the sender
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_is_relayed_to_others_only() {
    let (addr, _state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut b = authenticated_client(addr).await;

    send_text(&mut a, r#"{"foo":1}"#).await;

    assert_eq!(
        next_json(&mut b).await,
        json!({ "type": "td", "data": { "foo": 1 } })
    );
    assert_silent(&mut a).await;
}

// ---------------------------------------------------------------------------
// Test: relay fans out to every other client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payload_fans_out_to_all_other_clients() {
    let (addr, _state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut b = authenticated_client(addr).await;
    let mut c = authenticated_client(addr).await;

    let payload = json!({ "stroke": [[0, 0], [4, 2]], "color": "red" });
    send_text(&mut b, payload.to_string()).await;

    let expected = json!({ "type": "td", "data": payload });
    assert_eq!(next_json(&mut a).await, expected);
    assert_eq!(next_json(&mut c).await, expected);
    assert_silent(&mut b).await;
}

// ---------------------------------------------------------------------------
// Test: unparseable payload is dropped and the sender stays usable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_payload_is_dropped_and_sender_stays_open() {
    let (addr, _state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut b = authenticated_client(addr).await;

    send_text(&mut a, "{definitely not json").await;
    assert_silent(&mut b).await;
    assert_silent(&mut a).await;

    send_text(&mut a, r#"{"still":"here"}"#).await;
    assert_eq!(
        next_json(&mut b).await,
        json!({ "type": "td", "data": { "still": "here" } })
    );
}

// ---------------------------------------------------------------------------
// Test: binary frames carrying JSON are relayed like text
// ---------------------------------------------------------------------------

#[tokio::test]
async fn binary_payload_is_relayed() {
    let (addr, _state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut b = authenticated_client(addr).await;

    a.send(WsMessage::Binary(br#"[1,2,3]"#.to_vec()))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut b).await,
        json!({ "type": "td", "data": [1, 2, 3] })
    );
}

// ---------------------------------------------------------------------------
// Test: unauthenticated connections still receive broadcasts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unauthenticated_bystander_receives_broadcast() {
    let (addr, state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut bystander = connect(addr, "/").await;
    wait_for_connections(&state, 2).await;

    send_text(&mut a, r#"{"hello":"world"}"#).await;

    assert_eq!(
        next_json(&mut bystander).await,
        json!({ "type": "td", "data": { "hello": "world" } })
    );
}

// ---------------------------------------------------------------------------
// Test: closing every client empties the registry and stops the heartbeat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closing_all_clients_empties_registry() {
    let (addr, state) = spawn_server().await;
    let mut a = authenticated_client(addr).await;
    let mut b = authenticated_client(addr).await;

    wait_for_connections(&state, 2).await;
    assert!(state.hub.heartbeat().is_running().await);
    assert_eq!(state.hub.registry().authenticated_count().await, 2);

    a.close(None).await.unwrap();
    b.close(None).await.unwrap();

    wait_for_connections(&state, 0).await;
    assert!(!state.hub.heartbeat().is_running().await);

    let _c = authenticated_client(addr).await;
    wait_for_connections(&state, 1).await;
    assert!(state.hub.heartbeat().is_running().await);
    assert_eq!(state.hub.heartbeat().start_count(), 2);
}

// ---------------------------------------------------------------------------
// Test: development WebSocket listener accepts any path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dev_ws_listener_accepts_any_path() {
    let (addr, _state) = spawn_dev_ws_server().await;
    let mut client = connect(addr, "/some/path").await;

    send_text(&mut client, auth_claim(now_secs())).await;

    assert_eq!(next_json(&mut client).await["type"], "auth_ok");
}
