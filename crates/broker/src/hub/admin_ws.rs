//! `/ws/admin` — admin/metrics socket.
//!
//! Out of scope beyond sharing the auth module: this endpoint only
//! authenticates the caller and then streams a periodic snapshot of hub
//! counters (connections, pending permissions, live chains). Dashboards
//! and alerting live outside this system.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminWsQuery {
    pub token: String,
}

#[derive(Debug, Serialize)]
struct HubSnapshot {
    client_connections: usize,
    gateway_connections: usize,
    registered_agents: usize,
    pending_permissions: usize,
    live_chains: usize,
}

pub async fn admin_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<AdminWsQuery>,
) -> impl IntoResponse {
    if authenticate(&query.token, state.auth.as_ref(), &state.revocations)
        .await
        .is_err()
    {
        return (axum::http::StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state)).into_response()
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = HubSnapshot {
                    client_connections: state.clients.connection_count(),
                    gateway_connections: state.agents.list().len(),
                    registered_agents: state.agents.list().len(),
                    pending_permissions: state.permissions.len(),
                    live_chains: state.chains.len(),
                };
                let Ok(json) = serde_json::to_string(&snapshot) else { continue };
                if ws_sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            msg = ws_stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
        }
    }
}
