//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{self, Instant, Interval};

use crate::AppState;

use super::events::ServerEvent;
use super::session::{outbound_queue, OutboundQueue};

/// Close code sent when the handshake token is missing or invalid.
pub const CLOSE_AUTH_FAILED: u16 = 4001;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, params.token))
}

async fn handle_connection(socket: WebSocket, state: AppState, token: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound, queue) = outbound_queue();
    let gateway = state.gateway.clone();

    let session = match gateway.open(token.as_deref(), outbound).await {
        Ok(session) => session,
        Err(err) => {
            tracing::debug!(%err, "gateway handshake rejected");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, &err.client_message()).await;
            return;
        }
    };

    let ping_interval = state.config.ws_ping_interval;

    // The writer owns the sink; everything else enqueues on the session.
    let mut writer = tokio::spawn(write_frames(ws_tx, queue, ping_interval));

    // Peer must send something (a pong at least) within 1.5x the ping interval.
    let mut heartbeat = ping_interval.map(|period| {
        let deadline = period * 3 / 2;
        time::interval_at(Instant::now() + deadline, deadline)
    });
    let mut heard_from_peer = false;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                if matches!(msg, Some(Ok(_))) {
                    heard_from_peer = true;
                }
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        gateway.dispatch(&session, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        session.send(&ServerEvent::error("Invalid message format"));
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, session_id = %session.session_id, "ws read error");
                        break;
                    }
                }
            }

            // Writer stops when the socket can no longer be written to.
            _ = &mut writer => break,

            _ = next_tick(&mut heartbeat) => {
                if !heard_from_peer {
                    tracing::debug!(
                        session_id = %session.session_id,
                        "heartbeat timeout, closing connection"
                    );
                    break;
                }
                heard_from_peer = false;
            }
        }
    }

    gateway.close(&session).await;
    writer.abort();
}

/// Drain the session's outbound queue into the socket, in order, and send
/// keepalive pings.
async fn write_frames(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut queue: OutboundQueue,
    ping_interval: Option<Duration>,
) {
    let mut ping = ping_interval.map(|period| time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            _ = next_tick(&mut ping) => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Wait for the next tick, or forever when the timer is disabled.
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
