#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::{tungstenite, MaybeTlsStream, WebSocketStream};

use chat_api::auth::jwt::{self, SessionClaims};
pub use chat_api::config::Config;
use chat_api::config::StoreKind;
use chat_api::db::MemoryStore;
use chat_api::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Test configuration: in-memory store, no keepalive pings.
pub fn test_config() -> Config {
    Config {
        jwt_secret: TEST_SECRET.to_string(),
        store: StoreKind::Memory,
        ws_ping_interval: None,
        ..Config::default()
    }
}

/// Build a test AppState backed by the in-memory store.
pub fn test_state(config: Config) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (AppState::new(config, store.clone()), store)
}

/// Build the full application router wired to a fresh test state.
pub fn test_app() -> (Router, AppState, Arc<MemoryStore>) {
    app_with(test_config())
}

fn app_with(config: Config) -> (Router, AppState, Arc<MemoryStore>) {
    let (state, store) = test_state(config);
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Mint a session token the way the account service does.
pub fn mint_token(user_id: i32, username: &str) -> String {
    jwt::sign(
        TEST_SECRET,
        &SessionClaims {
            user_id,
            username: username.to_string(),
            exp: None,
        },
    )
    .expect("sign test token")
}

/// Start an actual TCP server for WebSocket testing.
/// Returns (addr, state, store). The server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryStore>) {
    start_ws_server_with(test_config()).await
}

pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState, Arc<MemoryStore>) {
    let (app, state, store) = app_with(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}

/// Open a WebSocket with `token` (if any) in the query string.
pub async fn open_ws(addr: SocketAddr, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws?token={token}"),
        None => format!("ws://{addr}/ws"),
    };
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Connect as a user and consume the `connected` event.
pub async fn connect(addr: SocketAddr, user_id: i32, username: &str) -> WsClient {
    let mut ws = open_ws(addr, Some(&mint_token(user_id, username))).await;
    let connected = recv_json(&mut ws).await;
    assert_eq!(connected["type"], "connected");
    assert_eq!(connected["userId"], user_id);
    assert_eq!(connected["username"], username);
    ws
}

pub async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Next text frame, decoded. Skips pings.
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");

        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("parse frame");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("expected text frame, got: {other:?}"),
        }
    }
}

/// Assert no text frame arrives within a short window.
pub async fn assert_silent(ws: &mut WsClient) {
    if let Ok(Some(Ok(tungstenite::Message::Text(text)))) =
        time::timeout(Duration::from_millis(200), ws.next()).await
    {
        panic!("unexpected frame: {}", text.as_str());
    }
}

/// Poll until `check` holds or a few seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
