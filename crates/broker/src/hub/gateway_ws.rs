//! `/ws/gateway` — the adapter-host-facing WebSocket endpoint.
//!
//! Flow: gateway connects, sends `gateway:auth` with its id + version
//! within `hello_timeout_secs`, the broker replies
//! `server:gateway_auth_result`, then streams agent registrations, status
//! updates, and message chunks/completions back through the hub.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use agentim_protocol::{ClientMessage, GatewayMessage};

use crate::auth::authenticate;
use crate::hub::dispatch::broadcast_to_room;
use crate::hub::registry::ConnectedGateway;
use crate::permission::{PermissionDecision, PermissionStore};
use crate::routing::engine::route_agent_reply;
use crate::state::AppState;
use agentim_domain::permission::{PermissionRequest, PermissionState};
use agentim_domain::trace::TraceEvent;
use agentim_protocol::DispatchEnvelope;

pub async fn gateway_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let hello_timeout = std::time::Duration::from_secs(state.config.websocket.hello_timeout_secs);

    let auth_frame = tokio::time::timeout(hello_timeout, async {
        while let Some(Ok(msg)) = ws_stream.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayMessage::Auth { token, gateway_id, version }) =
                    serde_json::from_str::<GatewayMessage>(&text)
                {
                    return Some((token, gateway_id, version));
                }
            }
        }
        None
    })
    .await
    .ok()
    .flatten();

    let Some((token, gateway_id, version)) = auth_frame else {
        tracing::warn!("gateway disconnected before sending gateway:auth");
        return;
    };

    let identity = match authenticate(&token, state.auth.as_ref(), &state.revocations).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = send_gw_message(
                &mut ws_sink,
                &GatewayMessage::AuthResult {
                    ok: false,
                    error: Some(e.to_string()),
                },
            )
            .await;
            return;
        }
    };

    if send_gw_message(&mut ws_sink, &GatewayMessage::AuthResult { ok: true, error: None })
        .await
        .is_err()
    {
        return;
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<GatewayMessage>(128);
    state.gateways.register(ConnectedGateway {
        gateway_id: gateway_id.clone(),
        owner_user_id: identity.user_id.clone(),
        version,
        connected_at: Utc::now(),
        last_seen: Utc::now(),
        sink: outbound_tx,
    });
    TraceEvent::GatewayConnected {
        gateway_id: gateway_id.clone(),
    }
    .emit();

    let writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if send_gw_message(&mut ws_sink, &msg).await.is_err() {
                break;
            }
        }
    });

    let max_frame = state.config.websocket.gateway_max_frame_bytes;
    while let Some(Ok(msg)) = ws_stream.next().await {
        match msg {
            Message::Text(text) => {
                if text.len() > max_frame {
                    tracing::warn!(gateway_id = %gateway_id, "dropping oversized gateway frame");
                    continue;
                }
                match serde_json::from_str::<GatewayMessage>(&text) {
                    Ok(parsed) => handle_inbound(&state, &gateway_id, parsed).await,
                    Err(e) => tracing::debug!(gateway_id = %gateway_id, error = %e, "ignoring unparseable gateway frame"),
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    writer.abort();
    state.agents.mark_gateway_offline(&gateway_id);
    state.gateways.remove(&gateway_id);
    TraceEvent::GatewayDisconnected {
        gateway_id: gateway_id.clone(),
        reason: "socket closed".into(),
    }
    .emit();
    tracing::info!(gateway_id = %gateway_id, "gateway disconnected");
}

async fn handle_inbound(state: &AppState, gateway_id: &str, msg: GatewayMessage) {
    state.gateways.touch(gateway_id);

    match msg {
        GatewayMessage::RegisterAgent { agent } => {
            state.agents.upsert(agent);
        }
        GatewayMessage::UnregisterAgent { agent_id } => {
            state.agents.remove(&agent_id);
        }
        GatewayMessage::AgentStatus {
            agent_id,
            status,
            queue_depth,
        } => {
            state.agents.set_status(&agent_id, status, queue_depth);
            TraceEvent::AgentQueueDepthChanged {
                agent_id,
                queue_depth,
            }
            .emit();
        }
        GatewayMessage::MessageChunk {
            message_id,
            agent_id,
            room_id,
            chunk,
        } => {
            broadcast_to_room(
                &state.clients,
                &room_id,
                ClientMessage::MessageChunk {
                    room_id,
                    message_id,
                    agent_id,
                    chunk,
                },
            )
            .await;
        }
        GatewayMessage::MessageComplete {
            message_id,
            agent_id,
            room_id,
            full_content,
            conversation_id,
            error,
        } => {
            handle_message_complete(state, message_id, agent_id, room_id, full_content, conversation_id, error).await;
        }
        GatewayMessage::PermissionRequest {
            permission_id,
            agent_id,
            room_id,
            tool_name,
            tool_input,
        } => {
            handle_permission_request(state, permission_id, agent_id, room_id, tool_name, tool_input).await;
        }
        _ => {
            tracing::debug!(gateway_id, "ignoring gateway frame with no server-side handling");
        }
    }
}

async fn handle_message_complete(
    state: &AppState,
    message_id: String,
    agent_id: String,
    room_id: String,
    full_content: String,
    conversation_id: Option<String>,
    error: Option<String>,
) {
    broadcast_to_room(
        &state.clients,
        &room_id,
        ClientMessage::MessageComplete {
            room_id: room_id.clone(),
            message_id: message_id.clone(),
            agent_id: agent_id.clone(),
            full_content: full_content.clone(),
            error,
        },
    )
    .await;

    // An agent's completed reply may itself @mention other agents; route
    // those the same way a user message would be, but against the
    // chain-safety + rate-limit guards since this is agent-to-agent.
    let Some(room) = state.rooms.peek(&room_id) else {
        return;
    };
    let Some(agent) = state.agents.get(&agent_id) else {
        return;
    };
    let Some(conversation_id) = conversation_id else {
        return;
    };

    let targets = route_agent_reply(
        &room,
        &agent.name,
        &full_content,
        &conversation_id,
        &state.chains,
        &state.rate_limiter,
    );

    for target in targets {
        let context = agentim_domain::room_context::RoomContextSnapshot {
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
            sender_name: agent.name.clone(),
            content: full_content.clone(),
            conversation_id: Some(conversation_id.clone()),
            depth: target.depth,
            is_mentioned: target.is_mentioned,
            context,
            dispatched_at: Utc::now(),
        };
        if let Err(e) = crate::hub::dispatch::send_to_agent(&state.agents, &state.gateways, &envelope).await {
            tracing::warn!(agent_id = %target.agent_id, error = %e, "agent-to-agent dispatch failed");
        }
    }
}

async fn handle_permission_request(
    state: &AppState,
    permission_id: String,
    agent_id: String,
    room_id: String,
    tool_name: String,
    tool_input: serde_json::Value,
) {
    let now = Utc::now();
    let deadline = now + chrono::Duration::from_std(state.permissions.timeout()).unwrap_or_default();
    let request = PermissionRequest {
        id: permission_id.clone(),
        agent_id: agent_id.clone(),
        room_id: room_id.clone(),
        tool_name: tool_name.clone(),
        tool_input: tool_input.clone(),
        created_at: now,
        deadline,
        state: PermissionState::Pending,
    };
    let rx = state.permissions.insert(request);

    broadcast_to_room(
        &state.clients,
        &room_id,
        ClientMessage::PermissionRequest {
            permission_id: permission_id.clone(),
            agent_id: agent_id.clone(),
            room_id: room_id.clone(),
            tool_name,
            tool_input,
            deadline,
        },
    )
    .await;

    let permissions = state.permissions.clone();
    let gateways = state.gateways.clone();
    let agents = state.agents.clone();
    let timeout = permissions.timeout();
    let reminder_delay = permissions.reminder_delay();

    tokio::spawn(async move {
        let approved = wait_for_decision(rx, reminder_delay, timeout, &permissions, &permission_id).await;

        if let Some(gateway_id) = agents.gateway_for_agent(&agent_id) {
            if let Some(sink) = gateways.sink(&gateway_id) {
                let _ = sink
                    .send(GatewayMessage::ServerPermissionResponse {
                        permission_id,
                        approved,
                        reason: None,
                    })
                    .await;
            }
        }
    });
}

/// Race the client's decision against a reminder fired at
/// `reminder_delay` and a hard deadline at `total_timeout`. A reminder
/// fires at most once and does not itself resolve the request — only a
/// client decision or the deadline does.
async fn wait_for_decision(
    rx: tokio::sync::oneshot::Receiver<PermissionDecision>,
    reminder_delay: std::time::Duration,
    total_timeout: std::time::Duration,
    permissions: &PermissionStore,
    permission_id: &str,
) -> bool {
    let deadline = tokio::time::sleep(total_timeout);
    let reminder = tokio::time::sleep(reminder_delay);
    tokio::pin!(deadline, reminder, rx);
    let mut reminder_fired = false;

    loop {
        tokio::select! {
            result = &mut rx => {
                return matches!(result, Ok(PermissionDecision::Allow));
            }
            _ = &mut reminder, if !reminder_fired => {
                reminder_fired = true;
                permissions.mark_reminder_sent(permission_id);
            }
            _ = &mut deadline => {
                permissions.expire(permission_id);
                return false;
            }
        }
    }
}

async fn send_gw_message(
    sink: &mut (impl SinkExt<Message> + Unpin),
    msg: &GatewayMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(json)).await.map_err(|_| ())
}
