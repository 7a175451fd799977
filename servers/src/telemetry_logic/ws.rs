//! Real-time egress: one WebSocket connection per listener, scoped to a
//! single agent.
//!
//! The connection task is the listener's whole lifecycle: it subscribes on
//! upgrade, pushes every record the dispatcher hands it, and unsubscribes on
//! any exit path. Inbound frames are keep-alive/control traffic only and are
//! drained and discarded; no historical backlog is sent on connect.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::StreamExt;

use crate::telemetry_logic::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(agent_id): Path<i32>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, agent_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, agent_id: i32) {
    let (listener_id, mut records) = state.registry.subscribe(agent_id);
    log::info!("Listener {} connected for agent {}", listener_id, agent_id);

    loop {
        tokio::select! {
            // Inbound client traffic: watch for disconnect, discard the rest.
            msg = socket.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
            // A record was stored for this agent; push it out.
            maybe_record = records.recv() => {
                match maybe_record {
                    Some(record) => {
                        match serde_json::to_string(&*record) {
                            Ok(payload) => {
                                if socket.send(Message::Text(payload.into())).await.is_err() {
                                    break; // client disconnected
                                }
                            }
                            Err(e) => {
                                log::error!("Failed to serialize record {}: {}", record.id, e);
                            }
                        }
                    }
                    None => break,
                }
            }
        }
    }

    state.registry.unsubscribe(agent_id, listener_id);
    log::info!("Listener {} disconnected from agent {}", listener_id, agent_id);
}
