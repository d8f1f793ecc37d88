mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time;
use tokio_tungstenite::tungstenite;

use chat_api::models::presence::PresenceStatus;

async fn expect_auth_close(ws: &mut common::WsClient, reason: &str) {
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("read error");

    match msg {
        tungstenite::Message::Close(Some(frame)) => {
            assert_eq!(
                frame.code,
                tungstenite::protocol::frame::coding::CloseCode::from(4001)
            );
            assert_eq!(frame.reason.as_str(), reason);
        }
        other => panic!("Expected Close frame, got: {other:?}"),
    }
}

#[tokio::test]
async fn gateway_connect_sends_connected() {
    let (addr, state, store) = common::start_ws_server().await;

    let _ws = common::connect(addr, 1, "alice").await;

    assert!(state.gateway.is_online(1));
    assert_eq!(store.presence(1).unwrap().status, PresenceStatus::Online);
}

#[tokio::test]
async fn gateway_rejects_missing_token() {
    let (addr, _state, _store) = common::start_ws_server().await;

    let mut ws = common::open_ws(addr, None).await;
    expect_auth_close(&mut ws, "Missing token").await;
}

#[tokio::test]
async fn gateway_rejects_invalid_token() {
    let (addr, state, store) = common::start_ws_server().await;

    let mut ws = common::open_ws(addr, Some("not-a-jwt")).await;
    expect_auth_close(&mut ws, "Invalid token").await;

    assert_eq!(state.gateway.session_count(1), 0);
    assert!(store.presence_history(1).is_empty());
}

#[tokio::test]
async fn gateway_message_fans_out_to_channel() {
    let (addr, _state, store) = common::start_ws_server().await;
    let mut alice = common::connect(addr, 1, "alice").await;
    let mut bob = common::connect(addr, 2, "bob").await;
    let mut carol = common::connect(addr, 3, "carol").await;

    common::send_json(&mut alice, json!({"type": "join-channel", "channelId": 7})).await;
    assert_eq!(
        common::recv_json(&mut alice).await["type"],
        "user-joined"
    );
    assert_eq!(
        common::recv_json(&mut alice).await,
        json!({"type": "joined-channel", "channelId": 7})
    );

    common::send_json(&mut bob, json!({"type": "join-channel", "channelId": 7})).await;
    let joined = common::recv_json(&mut alice).await;
    assert_eq!(joined["type"], "user-joined");
    assert_eq!(joined["user"]["id"], 2);
    assert_eq!(joined["user"]["status"], "online");
    assert_eq!(common::recv_json(&mut bob).await["type"], "user-joined");
    assert_eq!(common::recv_json(&mut bob).await["type"], "joined-channel");

    common::send_json(
        &mut alice,
        json!({"type": "message", "channelId": 7, "content": "hello"}),
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let msg = common::recv_json(ws).await;
        assert_eq!(msg["type"], "message");
        assert_eq!(msg["channelId"], 7);
        assert_eq!(msg["senderId"], 1);
        assert_eq!(msg["senderUsername"], "alice");
        assert_eq!(msg["content"], "hello");
        assert_eq!(msg["messageType"], "user");
    }
    common::assert_silent(&mut alice).await;
    common::assert_silent(&mut carol).await;

    let stored = store.messages();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn gateway_unknown_type_returns_error() {
    let (addr, _state, _store) = common::start_ws_server().await;
    let mut alice = common::connect(addr, 1, "alice").await;

    common::send_json(&mut alice, json!({"type": "bogus"})).await;
    assert_eq!(
        common::recv_json(&mut alice).await,
        json!({"type": "error", "message": "Unknown message type: bogus"})
    );

    // Connection stays usable.
    common::send_json(&mut alice, json!({"type": "join-channel", "channelId": 3})).await;
    assert_eq!(common::recv_json(&mut alice).await["type"], "user-joined");
    assert_eq!(common::recv_json(&mut alice).await["type"], "joined-channel");
}

#[tokio::test]
async fn gateway_binary_frame_returns_error() {
    let (addr, _state, _store) = common::start_ws_server().await;
    let mut alice = common::connect(addr, 1, "alice").await;

    alice
        .send(tungstenite::Message::Binary(vec![1, 2, 3].into()))
        .await
        .expect("send binary");

    assert_eq!(
        common::recv_json(&mut alice).await,
        json!({"type": "error", "message": "Invalid message format"})
    );
}

#[tokio::test]
async fn gateway_disconnect_broadcasts_offline() {
    let (addr, state, store) = common::start_ws_server().await;
    let mut alice = common::connect(addr, 1, "alice").await;
    let mut bob = common::connect(addr, 2, "bob").await;

    for ws in [&mut alice, &mut bob] {
        common::send_json(ws, json!({"type": "join-channel", "channelId": 7})).await;
    }
    // alice: own user-joined, joined-channel, bob's user-joined
    for _ in 0..3 {
        common::recv_json(&mut alice).await;
    }
    for _ in 0..2 {
        common::recv_json(&mut bob).await;
    }

    bob.close(None).await.expect("close");

    assert_eq!(
        common::recv_json(&mut alice).await,
        json!({"type": "status-changed", "userId": 2, "username": "bob", "status": "offline"})
    );
    common::eventually(|| !state.gateway.is_online(2)).await;
    assert_eq!(store.presence(2).unwrap().status, PresenceStatus::Offline);
    assert_eq!(state.gateway.subscriber_count(7), 1);
}

#[tokio::test]
async fn gateway_second_device_keeps_user_online() {
    let (addr, state, store) = common::start_ws_server().await;
    let mut phone = common::connect(addr, 1, "alice").await;
    let _laptop = common::connect(addr, 1, "alice").await;
    assert_eq!(state.gateway.session_count(1), 2);

    phone.close(None).await.expect("close");

    common::eventually(|| state.gateway.session_count(1) == 1).await;
    assert!(state.gateway.is_online(1));
    assert_eq!(store.presence(1).unwrap().status, PresenceStatus::Online);
}

#[tokio::test]
async fn gateway_reaps_unresponsive_peer() {
    let config = common::Config {
        ws_ping_interval: Some(Duration::from_millis(50)),
        ..common::test_config()
    };
    let (addr, state, store) = common::start_ws_server_with(config).await;

    // Handshake completes, then the client never reads again, so it never
    // answers a ping.
    let _silent = common::connect(addr, 1, "alice").await;
    assert!(state.gateway.is_online(1));

    common::eventually(|| {
        store
            .presence(1)
            .is_some_and(|p| p.status == PresenceStatus::Offline)
    })
    .await;
    assert_eq!(state.gateway.session_count(1), 0);
}

#[tokio::test]
async fn gateway_keeps_peer_that_answers_pings() {
    let config = common::Config {
        ws_ping_interval: Some(Duration::from_millis(50)),
        ..common::test_config()
    };
    let (addr, state, _store) = common::start_ws_server_with(config).await;
    let mut ws = common::connect(addr, 1, "alice").await;

    // Reading lets the client answer each ping with a pong.
    let _ = time::timeout(Duration::from_millis(500), async {
        while ws.next().await.is_some() {}
    })
    .await;

    assert_eq!(state.gateway.session_count(1), 1);
}
