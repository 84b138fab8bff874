//! `/ws/client` — the human-facing WebSocket endpoint.
//!
//! Flow: client connects, sends `client:auth` within `hello_timeout_secs`,
//! the broker authenticates and replies `server:auth_result`, then a
//! bidirectional message loop runs until the socket closes.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use agentim_protocol::ClientMessage;

use crate::auth::authenticate;
use crate::hub::dispatch::{broadcast_to_room, send_to_agent};
use crate::hub::registry::ConnectedClient;
use crate::permission::PermissionDecision;
use crate::routing::engine::{finish_broadcast_routing, route_user_message};
use crate::state::AppState;
use agentim_domain::message::RoutingMode;
use agentim_domain::room_context::RoomContextSnapshot;
use agentim_domain::trace::TraceEvent;
use agentim_protocol::DispatchEnvelope;

pub async fn client_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let hello_timeout = std::time::Duration::from_secs(state.config.websocket.hello_timeout_secs);

    let auth_msg = tokio::time::timeout(hello_timeout, async {
        while let Some(Ok(msg)) = ws_stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientMessage::Auth { token }) = serde_json::from_str::<ClientMessage>(&text) {
                    return Some(token);
                }
            }
        }
        None
    })
    .await
    .ok()
    .flatten();

    let Some(token) = auth_msg else {
        tracing::warn!("client disconnected before sending client:auth");
        return;
    };

    let identity = match authenticate(&token, state.auth.as_ref(), &state.revocations).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = send_ws_message(
                &mut ws_sink,
                &ClientMessage::AuthResult {
                    ok: false,
                    user_id: None,
                    error: Some(e.to_string()),
                },
            )
            .await;
            return;
        }
    };

    if send_ws_message(
        &mut ws_sink,
        &ClientMessage::AuthResult {
            ok: true,
            user_id: Some(identity.user_id.clone()),
            error: None,
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let connection_id = Uuid::new_v4().to_string();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ClientMessage>(64);

    state.clients.register(ConnectedClient {
        connection_id: connection_id.clone(),
        user_id: identity.user_id.clone(),
        rooms: Vec::new(),
        connected_at: Utc::now(),
        sink: outbound_tx,
    });

    tracing::info!(connection_id = %connection_id, user_id = %identity.user_id, "client connected");

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if send_ws_message(&mut ws_sink, &msg).await.is_err() {
                break;
            }
        }
    });

    let max_frame = state.config.websocket.client_max_frame_bytes;
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                if text.len() > max_frame {
                    tracing::warn!(connection_id = %connection_id, "dropping oversized client frame");
                    continue;
                }
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(parsed) => handle_inbound(&state, &connection_id, &identity.user_id, parsed).await,
                    Err(e) => tracing::debug!(connection_id = %connection_id, error = %e, "ignoring unparseable client frame"),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.clients.remove(&connection_id);
    tracing::info!(connection_id = %connection_id, "client disconnected");
}

async fn handle_inbound(state: &AppState, connection_id: &str, user_id: &str, msg: ClientMessage) {
    match msg {
        ClientMessage::JoinRoom { room_id } => {
            state.clients.join_room(connection_id, &room_id);
        }
        ClientMessage::LeaveRoom { room_id } => {
            state.clients.leave_room(connection_id, &room_id);
        }
        ClientMessage::SendMessage {
            room_id, content, ..
        } => {
            handle_send_message(state, &room_id, user_id, &content).await;
        }
        ClientMessage::Typing { room_id, is_typing } => {
            broadcast_to_room(
                &state.clients,
                &room_id,
                ClientMessage::ServerTyping {
                    room_id: room_id.clone(),
                    user_id: user_id.to_string(),
                    is_typing,
                },
            )
            .await;
        }
        ClientMessage::PermissionResponse {
            permission_id,
            approved,
            ..
        } => {
            let decision = if approved {
                PermissionDecision::Allow
            } else {
                PermissionDecision::Deny
            };
            state.permissions.resolve(&permission_id, decision);
        }
        _ => {
            tracing::debug!(connection_id, "ignoring client frame with no server-side handling");
        }
    }
}

async fn handle_send_message(state: &AppState, room_id: &str, user_id: &str, content: &str) {
    let Some(room) = state.rooms.peek(room_id) else {
        tracing::warn!(room_id, "send_message for room not in cache");
        return;
    };

    let message_id = Uuid::new_v4().to_string();
    let decision = route_user_message(&room, content, state.ai_router.is_configured(), || Uuid::new_v4().to_string());

    let decision = if decision.mode == RoutingMode::Broadcast && decision.targets.is_empty() {
        let agent_names: Vec<String> = room
            .members
            .iter()
            .filter(|m| m.member_type == agentim_domain::room::MemberType::Agent)
            .map(|m| m.name.clone())
            .collect();
        let chosen = state
            .ai_router
            .choose_agents(&room.name, room.system_prompt.as_deref(), &agent_names, &[], content)
            .await;
        finish_broadcast_routing(&room, &chosen, || Uuid::new_v4().to_string())
    } else {
        decision
    };

    TraceEvent::RoutingDecision {
        message_id: message_id.clone(),
        room_id: room_id.to_string(),
        target_agent_ids: decision.targets.iter().map(|t| t.agent_id.clone()).collect(),
        routing_mode: format!("{:?}", decision.mode).to_lowercase(),
        conversation_id: decision.conversation_id.clone(),
        depth: decision.targets.first().map(|t| t.depth).unwrap_or(0),
    }
    .emit();

    for target in &decision.targets {
        if !state.rate_limiter.try_acquire(&target.agent_id) {
            TraceEvent::RateLimited {
                agent_id: target.agent_id.clone(),
                limit_kind: "dispatch_per_minute".into(),
            }
            .emit();
            continue;
        }

        let context = RoomContextSnapshot {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            system_prompt: room.system_prompt.clone(),
            members: room.members.clone(),
            recent_messages: None,
            generated_at: Utc::now(),
        };

        let envelope = DispatchEnvelope {
            message_id: message_id.clone(),
            agent_id: target.agent_id.clone(),
            room_id: room.id.clone(),
            sender_name: user_id.to_string(),
            content: content.to_string(),
            conversation_id: decision.conversation_id.clone(),
            depth: target.depth,
            is_mentioned: target.is_mentioned,
            context,
            dispatched_at: Utc::now(),
        };

        if let Some(conversation_id) = &decision.conversation_id {
            state.chains.record_dispatch(conversation_id, &target.agent_id);
            TraceEvent::ChainDispatched {
                conversation_id: conversation_id.clone(),
                agent_id: target.agent_id.clone(),
                depth: target.depth,
            }
            .emit();
        }

        if let Err(e) = send_to_agent(&state.agents, &state.gateways, &envelope).await {
            tracing::warn!(agent_id = %target.agent_id, error = %e, "dispatch to agent failed");
        }
    }
}

async fn send_ws_message(
    sink: &mut (impl SinkExt<Message> + Unpin),
    msg: &ClientMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
