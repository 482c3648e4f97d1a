//! Relay WebSocket sessions
//!
//! Each upgraded socket runs on its own task and handles its inbound
//! messages one at a time, which keeps a producer's frames in order.
//! Closing the socket, a failed send, or an idle timeout all lead to the
//! same cleanup: the session is removed from the relay.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use super::listener::GatewayState;
use crate::relay::FramePayload;
use crate::session::{ConnectionRole, SessionContext};

/// Handles `GET /ws/{*path}` upgrade requests
pub(crate) async fn upgrade(
    ws: WebSocketUpgrade,
    Path(path): Path<String>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<GatewayState>,
) -> Response {
    let permit = match state.admit() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(peer = %peer_addr, path = %path, "Relay socket rejected: limit reached");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let session_id = state.next_session_id();
    let classified = ConnectionRole::classify(&path);

    ws.on_upgrade(move |socket| async move {
        let _permit = permit;

        let Some((role, device_id)) = classified else {
            run_inert(socket, session_id, peer_addr, &path, &state).await;
            return;
        };

        let ctx = SessionContext::new(session_id, peer_addr, role, device_id);
        tracing::debug!(
            session_id = ctx.session_id,
            peer = %ctx.peer_addr,
            device = %ctx.device_id,
            role = %ctx.role,
            "Relay socket opened"
        );

        match role {
            ConnectionRole::Producer => run_producer(socket, &ctx, &state).await,
            ConnectionRole::Consumer => run_consumer(socket, &ctx, &state).await,
        }

        tracing::debug!(
            session_id = ctx.session_id,
            device = %ctx.device_id,
            role = %ctx.role,
            duration_secs = ctx.connected_at.elapsed().as_secs(),
            "Relay socket closed"
        );
    })
}

/// Outcome of a heartbeat tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heartbeat {
    /// Peer was heard from recently; send a ping
    Ping,
    /// Nothing received within the idle timeout
    Expired,
}

/// Ping schedule and idle detection for one socket
struct Liveness {
    ticker: Interval,
    last_seen: Instant,
    idle_timeout: Duration,
}

impl Liveness {
    fn new(ping_interval: Duration, idle_timeout: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + ping_interval, ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ticker,
            last_seen: Instant::now(),
            idle_timeout,
        }
    }

    /// Record inbound traffic of any kind
    fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    async fn tick(&mut self) -> Heartbeat {
        self.ticker.tick().await;
        if self.last_seen.elapsed() >= self.idle_timeout {
            Heartbeat::Expired
        } else {
            Heartbeat::Ping
        }
    }
}

async fn run_producer(mut socket: WebSocket, ctx: &SessionContext, state: &GatewayState) {
    let relay = state.hub.relay();

    let mut lease = match relay.register_producer(&ctx.device_id, ctx.session_id).await {
        Ok(lease) => lease,
        Err(e) => {
            let close = CloseFrame {
                code: close_code::POLICY,
                reason: e.to_string().into(),
            };
            let _ = socket.send(Message::Close(Some(close))).await;
            return;
        }
    };

    let mut liveness = Liveness::new(state.ping_interval, state.idle_timeout);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let payload = match msg {
                    Some(Ok(Message::Text(text))) => FramePayload::text(text.as_str()),
                    Some(Ok(Message::Binary(data))) => FramePayload::binary(data),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        liveness.touch();
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session_id = ctx.session_id, error = %e, "Producer socket error");
                        break;
                    }
                };

                liveness.touch();
                if let Err(e) = relay.publish_frame(&ctx.device_id, ctx.session_id, payload).await {
                    tracing::debug!(session_id = ctx.session_id, error = %e, "Frame refused");
                    break;
                }
            }
            _ = lease.superseded() => {
                let close = CloseFrame {
                    code: close_code::POLICY,
                    reason: Utf8Bytes::from_static("superseded by a newer producer"),
                };
                let _ = socket.send(Message::Close(Some(close))).await;
                break;
            }
            beat = liveness.tick() => {
                if beat == Heartbeat::Expired {
                    tracing::info!(
                        session_id = ctx.session_id,
                        device = %ctx.device_id,
                        "Producer idle timeout"
                    );
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    relay
        .unregister_producer(&ctx.device_id, lease.session_id())
        .await;
}

async fn run_consumer(mut socket: WebSocket, ctx: &SessionContext, state: &GatewayState) {
    let relay = state.hub.relay();
    let mut subscription = relay.subscribe(&ctx.device_id, ctx.session_id).await;
    let mut liveness = Liveness::new(state.ping_interval, state.idle_timeout);

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    break;
                };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(session_id = ctx.session_id, error = %e, "Event encode failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                // Viewers have nothing to say; inbound only proves liveness
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(session_id = ctx.session_id, error = %e, "Viewer socket error");
                        break;
                    }
                    Some(Ok(_)) => liveness.touch(),
                }
            }
            beat = liveness.tick() => {
                if beat == Heartbeat::Expired {
                    tracing::info!(
                        session_id = ctx.session_id,
                        device = %ctx.device_id,
                        "Viewer idle timeout"
                    );
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    relay.unsubscribe(&ctx.device_id, ctx.session_id).await;
}

/// Keep an unclassified socket open without relaying anything
///
/// Subject to the same liveness check as relay sessions, so a silent peer
/// cannot hold a connection slot forever.
async fn run_inert(
    mut socket: WebSocket,
    session_id: u64,
    peer_addr: SocketAddr,
    path: &str,
    state: &GatewayState,
) {
    tracing::debug!(
        session_id = session_id,
        peer = %peer_addr,
        path = %path,
        "Unclassified relay socket"
    );

    let mut liveness = Liveness::new(state.ping_interval, state.idle_timeout);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => liveness.touch(),
                }
            }
            beat = liveness.tick() => {
                if beat == Heartbeat::Expired {
                    tracing::debug!(session_id = session_id, path = %path, "Unclassified socket idle timeout");
                    break;
                }
                if socket.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}
