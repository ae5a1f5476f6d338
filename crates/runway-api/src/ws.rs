//! WebSocket feed for live run events.
//!
//! One connection per run. The first message is a snapshot of the run's
//! full event history; each subsequent message relays one newly observed
//! event in log order. When heartbeats are enabled, idle poll ticks emit a
//! `{type: "heartbeat"}` frame so the transport can detect liveness.
//!
//! The feed has no end-of-run signal: clients watch the relayed titles (or
//! poll the run's status) to know the run is done, and the poll task stops
//! when the client disconnects.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;

use runway_core::RunId;
use runway_flow::tail::{subscribe, TailConfig};

use crate::error::ApiError;
use crate::server::AppState;

/// Upgrades `GET /ws/runs/{run_id}` to a per-run event feed.
pub(crate) async fn ws_run_events(
    ws: WebSocketUpgrade,
    Path(run_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, ApiError> {
    let run_id: RunId = run_id.parse().map_err(ApiError::from)?;
    Ok(ws.on_upgrade(move |socket| relay_feed(socket, state, run_id)))
}

/// Relays feed messages to the socket until either side disconnects.
async fn relay_feed(mut socket: WebSocket, state: Arc<AppState>, run_id: RunId) {
    let config = TailConfig {
        poll_interval: state.config.feed.poll_interval(),
        heartbeat: state.config.feed.heartbeat,
    };
    let (mut feed, _poll_task) = subscribe(state.store(), run_id, config);

    tracing::debug!(run_id = %run_id, "feed subscriber connected");

    loop {
        tokio::select! {
            message = feed.recv() => {
                let Some(message) = message else {
                    // The poll task ended (snapshot failure); close politely.
                    break;
                };
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(run_id = %run_id, error = %err, "feed message serialization failed");
                        break;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    // Client went away; dropping the receiver below stops
                    // the poll task on its next tick.
                    None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                    // Inbound frames are not part of the contract; ignore.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(run_id = %run_id, "feed subscriber disconnected");
}
