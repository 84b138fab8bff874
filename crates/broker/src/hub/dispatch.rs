//! Fan-out helpers: pushing frames to every client socket in a room, and
//! handing a routed message off to the gateway that owns the target agent.
//!
//! Unlike a tool-call round trip, a dispatch to an agent has no pending/
//! oneshot bookkeeping here — the gateway streams `message_chunk` and
//! `message_complete` back asynchronously and the hub forwards those to
//! clients as they arrive.

use agentim_domain::error::{Error, Result};
use agentim_protocol::{ClientMessage, DispatchEnvelope, GatewayMessage};

use super::registry::{AgentRegistry, ClientRegistry, GatewayRegistry};

/// Push a frame to every client socket joined to `room_id`. Dead sinks
/// (client disconnected without cleanup running yet) are silently
/// skipped — the WS reader task will evict the registry entry shortly.
pub async fn broadcast_to_room(clients: &ClientRegistry, room_id: &str, message: ClientMessage) {
    for sink in clients.sinks_for_room(room_id) {
        let _ = sink.send(message.clone()).await;
    }
}

pub async fn send_to_user(clients: &ClientRegistry, user_id: &str, message: ClientMessage) {
    for sink in clients.sinks_for_user(user_id) {
        let _ = sink.send(message.clone()).await;
    }
}

/// Hand a routed turn to the agent's owning gateway. Fails with
/// `AgentBusy` semantics left to the caller (the routing engine checks
/// queue state before calling this); this function only concerns itself
/// with "is the gateway still connected".
pub async fn send_to_agent(
    agents: &AgentRegistry,
    gateways: &GatewayRegistry,
    envelope: &DispatchEnvelope,
) -> Result<()> {
    let gateway_id = agents
        .gateway_for_agent(&envelope.agent_id)
        .ok_or_else(|| Error::Validation(format!("unknown agent {}", envelope.agent_id)))?;

    let sink = gateways
        .sink(&gateway_id)
        .ok_or_else(|| Error::Transient(format!("gateway {gateway_id} not connected")))?;

    let frame = GatewayMessage::SendToAgent {
        agent_id: envelope.agent_id.clone(),
        room_id: envelope.room_id.clone(),
        message_id: envelope.message_id.clone(),
        sender_name: envelope.sender_name.clone(),
        conversation_id: envelope.conversation_id.clone(),
        depth: envelope.depth,
        content: envelope.content.clone(),
        context: envelope.context.clone(),
    };

    sink.send(frame)
        .await
        .map_err(|_| Error::Transient(format!("gateway {gateway_id} send channel closed")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::agent::{Agent, AgentStatus, AgentType};
    use agentim_domain::room_context::RoomContextSnapshot;
    use chrono::Utc;
    use tokio::sync::mpsc;

    fn envelope() -> DispatchEnvelope {
        DispatchEnvelope {
            message_id: "m1".into(),
            agent_id: "a1".into(),
            room_id: "r1".into(),
            sender_name: "alice".into(),
            content: "hi".into(),
            conversation_id: None,
            depth: 0,
            is_mentioned: true,
            context: RoomContextSnapshot {
                room_id: "r1".into(),
                room_name: "room".into(),
                system_prompt: None,
                members: vec![],
                recent_messages: None,
                generated_at: Utc::now(),
            },
            dispatched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn send_to_agent_fails_for_unknown_agent() {
        let agents = AgentRegistry::new();
        let gateways = GatewayRegistry::new();
        let err = send_to_agent(&agents, &gateways, &envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn send_to_agent_fails_when_gateway_disconnected() {
        let agents = AgentRegistry::new();
        let gateways = GatewayRegistry::new();
        agents.upsert(Agent {
            id: "a1".into(),
            name: "a1".into(),
            agent_type: AgentType::Generic,
            owner_user_id: "u1".into(),
            gateway_id: "gw1".into(),
            working_directory: None,
            capabilities: vec![],
            status: AgentStatus::Online,
            queue_depth: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_seen_at: None,
        });
        let err = send_to_agent(&agents, &gateways, &envelope()).await.unwrap_err();
        assert!(matches!(err, Error::Transient(_)));
    }

    #[tokio::test]
    async fn send_to_agent_succeeds_with_connected_gateway() {
        let agents = AgentRegistry::new();
        let gateways = GatewayRegistry::new();
        agents.upsert(Agent {
            id: "a1".into(),
            name: "a1".into(),
            agent_type: AgentType::Generic,
            owner_user_id: "u1".into(),
            gateway_id: "gw1".into(),
            working_directory: None,
            capabilities: vec![],
            status: AgentStatus::Online,
            queue_depth: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_seen_at: None,
        });
        let (tx, mut rx) = mpsc::channel(4);
        gateways.register(super::super::registry::ConnectedGateway {
            gateway_id: "gw1".into(),
            owner_user_id: "u1".into(),
            version: "0.1.0".into(),
            connected_at: Utc::now(),
            last_seen: Utc::now(),
            sink: tx,
        });
        send_to_agent(&agents, &gateways, &envelope()).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert!(matches!(frame, GatewayMessage::SendToAgent { .. }));
    }
}
