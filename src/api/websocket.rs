//! WebSocket layer for live dispatch updates.
//!
//! Handles upgrade, heartbeat (30s), room membership, crew location
//! frames and per-connection rate limiting (10 incoming messages/sec).
//!
//! Connection lifecycle:
//! 1. Client opens `GET /ws` and receives `welcome`
//! 2. Client sends `join_room` for `dispatch_center`, `ambulance:<id>`,
//!    `hospital:<id>` or `emergency:<id>`
//! 3. Events for joined rooms arrive as `{"type":"event","payload":{..}}`
//! 4. Heartbeat every 30s; 3 missed = disconnect

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::events::{DispatchEvent, Subscription, Topic};
use crate::models::GeoPoint;

/// Heartbeat interval: server sends Heartbeat every 30 seconds.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Disconnect after this many missed heartbeats (3 × 30s = 90s).
const MAX_MISSED_HEARTBEATS: u32 = 3;

/// Maximum incoming messages per second per connection.
const MAX_INCOMING_PER_SECOND: u32 = 10;

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    /// Crew position fix; same effect as `POST /api/ambulance/location`.
    UpdateLocation { ambulance_id: Uuid, lat: f64, lng: f64 },
    Pong {},
}

/// Server → client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    Welcome { session_id: String, server_time: String },
    Heartbeat { server_time: String },
    Joined { room: String },
    Left { room: String },
    Event { payload: DispatchEvent },
    Error { message: String },
}

/// Action returned by `WsSessionState::on_heartbeat_tick()`.
#[derive(Debug, PartialEq)]
pub(crate) enum HeartbeatAction {
    SendHeartbeat,
    HeartbeatTimeout,
}

/// Per-connection liveness and rate state, kept apart from the socket
/// so it can be tested without one.
pub(crate) struct WsSessionState {
    missed_heartbeats: u32,
    incoming_times: VecDeque<Instant>,
}

impl WsSessionState {
    fn new() -> Self {
        Self {
            missed_heartbeats: 0,
            incoming_times: VecDeque::new(),
        }
    }

    fn on_pong(&mut self) {
        self.missed_heartbeats = 0;
    }

    fn on_heartbeat_tick(&mut self) -> HeartbeatAction {
        if self.missed_heartbeats >= MAX_MISSED_HEARTBEATS {
            return HeartbeatAction::HeartbeatTimeout;
        }
        self.missed_heartbeats += 1;
        HeartbeatAction::SendHeartbeat
    }

    /// Returns true if the message is within the rate limit.
    fn check_rate(&mut self) -> bool {
        check_incoming_rate(&mut self.incoming_times)
    }
}

/// `GET /ws`: upgrade. No authentication.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<ApiContext>) -> impl IntoResponse {
    let core = ctx.core.clone();
    ws.on_upgrade(move |socket| handle_ws(socket, core))
}

/// Spawns a sender task for channel → socket forwarding, then runs the
/// receive, event and heartbeat loop until disconnect.
async fn handle_ws(socket: WebSocket, core: Arc<CoreState>) {
    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<WsOutgoing>(64);

    let sender_handle = tokio::spawn(async move {
        let mut sink = ws_sink;
        let mut rx = rx;
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode WebSocket frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let session_id = Uuid::new_v4().to_string();
    let mut subscription = core.hub().subscribe();
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let _ = tx
        .send(WsOutgoing::Welcome {
            session_id: session_id.clone(),
            server_time: chrono::Utc::now().to_rfc3339(),
        })
        .await;

    let mut session = WsSessionState::new();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // Consume initial immediate tick

    loop {
        tokio::select! {
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(ref text))) => {
                        if !session.check_rate() {
                            continue;
                        }
                        match serde_json::from_str::<WsIncoming>(text) {
                            Ok(WsIncoming::Pong {}) => session.on_pong(),
                            Ok(incoming) => {
                                handle_incoming(&core, &mut subscription, incoming, &tx).await;
                            }
                            Err(e) => {
                                let _ = tx.send(WsOutgoing::Error {
                                    message: format!("Unrecognised message: {e}"),
                                }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {} // Ping/Pong handled by axum/tungstenite
                }
            }
            event = subscription.recv() => {
                match event {
                    Some(event) => {
                        let frame = WsOutgoing::Event { payload: event.as_ref().clone() };
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                match session.on_heartbeat_tick() {
                    HeartbeatAction::HeartbeatTimeout => {
                        tracing::info!(
                            session_id = %session_id,
                            "{MAX_MISSED_HEARTBEATS} missed heartbeats, disconnecting"
                        );
                        break;
                    }
                    HeartbeatAction::SendHeartbeat => {
                        let _ = tx.send(WsOutgoing::Heartbeat {
                            server_time: chrono::Utc::now().to_rfc3339(),
                        }).await;
                    }
                }
            }
        }
    }

    drop(tx);
    let _ = sender_handle.await;
    tracing::info!(session_id = %session_id, "WebSocket disconnected");
}

/// Check if an incoming message is within the rate limit (10/sec).
fn check_incoming_rate(timestamps: &mut VecDeque<Instant>) -> bool {
    let now = Instant::now();
    let one_sec_ago = now - Duration::from_secs(1);

    while let Some(&front) = timestamps.front() {
        if front < one_sec_ago {
            timestamps.pop_front();
        } else {
            break;
        }
    }

    if timestamps.len() as u32 >= MAX_INCOMING_PER_SECOND {
        return false;
    }

    timestamps.push_back(now);
    true
}

async fn handle_incoming(
    core: &Arc<CoreState>,
    subscription: &mut Subscription,
    msg: WsIncoming,
    tx: &mpsc::Sender<WsOutgoing>,
) {
    let reply = match msg {
        WsIncoming::JoinRoom { room } => match Topic::parse(&room) {
            Some(topic) => {
                subscription.join(topic);
                WsOutgoing::Joined { room: topic.as_room() }
            }
            None => WsOutgoing::Error {
                message: format!("Unknown room: {room}"),
            },
        },
        WsIncoming::LeaveRoom { room } => match Topic::parse(&room) {
            Some(topic) => {
                subscription.leave(&topic);
                WsOutgoing::Left { room: topic.as_room() }
            }
            None => WsOutgoing::Error {
                message: format!("Unknown room: {room}"),
            },
        },
        WsIncoming::UpdateLocation {
            ambulance_id,
            lat,
            lng,
        } => match record_location(core.clone(), ambulance_id, GeoPoint::new(lat, lng)).await {
            // The broadcast itself confirms the update.
            Ok(()) => return,
            Err(message) => WsOutgoing::Error { message },
        },
        WsIncoming::Pong {} => return,
    };
    let _ = tx.send(reply).await;
}

async fn record_location(core: Arc<CoreState>, ambulance_id: Uuid, point: GeoPoint) -> Result<(), String> {
    tokio::task::spawn_blocking(move || {
        let mut conn = core.open_db().map_err(|e| e.to_string())?;
        core.dispatcher(&mut conn)
            .record_location(&ambulance_id, point)
            .map(|_| ())
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("location task failed: {e}"))?
}
