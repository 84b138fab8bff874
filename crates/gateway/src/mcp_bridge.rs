//! Conversation Broadcast bridge — a localhost HTTP endpoint on an
//! ephemeral port that adapter-spawned tool subprocesses call back into.
//!
//! Every call re-enters the routing engine via the normal
//! `gateway:message_complete` path: the bridge never talks to the broker
//! through a side channel, so the broker's depth/visited/rate-limit
//! checks apply exactly as they would to a real agent reply.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agentim_domain::error::{Error, Result};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use agentim_protocol::GatewayMessage;

use crate::agent_manager::GatewaySink;
use crate::room_context::RoomContextCache;

pub const MAX_PENDING_REPLIES_PER_AGENT: usize = 10;
pub const MAX_REPLY_TIMEOUT_SECS: u64 = 300;

/// Tracks `requestReply` calls awaiting a correlated response, keyed by
/// `(agent_id, conversation_id)`, capped per agent.
#[derive(Default)]
pub struct PendingReplyStore {
    pending: RwLock<HashMap<String, HashMap<String, oneshot::Sender<String>>>>,
}

impl PendingReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, agent_id: &str, conversation_id: &str) -> Result<oneshot::Receiver<String>> {
        let mut pending = self.pending.write();
        let for_agent = pending.entry(agent_id.to_string()).or_default();
        if for_agent.len() >= MAX_PENDING_REPLIES_PER_AGENT {
            return Err(Error::Limit(format!(
                "agent {agent_id} already has {MAX_PENDING_REPLIES_PER_AGENT} pending replies"
            )));
        }
        let (tx, rx) = oneshot::channel();
        for_agent.insert(conversation_id.to_string(), tx);
        Ok(rx)
    }

    /// Resolve a pending reply. Returns `true` if one was waiting —
    /// callers use this to decide whether an inbound dispatch should be
    /// treated as a reply instead of a fresh turn.
    pub fn resolve(&self, agent_id: &str, conversation_id: &str, content: String) -> bool {
        let mut pending = self.pending.write();
        let Some(for_agent) = pending.get_mut(agent_id) else {
            return false;
        };
        match for_agent.remove(conversation_id) {
            Some(tx) => {
                let _ = tx.send(content);
                true
            }
            None => false,
        }
    }

    fn unregister(&self, agent_id: &str, conversation_id: &str) {
        if let Some(for_agent) = self.pending.write().get_mut(agent_id) {
            for_agent.remove(conversation_id);
        }
    }
}

pub struct McpBridgeState {
    pub room_contexts: Arc<RoomContextCache>,
    pub outbound: Arc<Mutex<Option<GatewaySink>>>,
    pub pending_replies: Arc<PendingReplyStore>,
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    agent_id: String,
    room_id: String,
    target_agent_name: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct RequestReplyRequest {
    agent_id: String,
    room_id: String,
    target_agent_name: String,
    content: String,
    #[serde(default)]
    timeout_sec: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ReplyResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RoomQuery {
    agent_id: String,
    room_id: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Bind the bridge to an ephemeral localhost port and serve it in the
/// background. Returns the bound port.
pub async fn spawn(state: Arc<McpBridgeState>) -> std::io::Result<u16> {
    let router = Router::new()
        .route("/v1/send_message", post(send_message))
        .route("/v1/request_reply", post(request_reply))
        .route("/v1/room_messages", get(room_messages))
        .route("/v1/room_members", get(room_members))
        .with_state(state);

    let addr: SocketAddr = "127.0.0.1:0".parse().expect("valid loopback address");
    let listener = TcpListener::bind(addr).await?;
    let port = listener.local_addr()?.port();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "MCP bridge server exited");
        }
    });

    Ok(port)
}

/// Build the mention-addressed content and dispatch it as a
/// `gateway:message_complete` so the broker's normal routing applies.
async fn inject(state: &McpBridgeState, agent_id: &str, room_id: &str, target: &str, content: &str, conversation_id: String) -> Result<()> {
    let sink = state.outbound.lock().clone().ok_or_else(|| Error::Transient("not connected to broker".into()))?;
    let addressed = format!("@{target} {content}");
    sink.send(GatewayMessage::MessageComplete {
        message_id: uuid::Uuid::new_v4().to_string(),
        agent_id: agent_id.to_string(),
        room_id: room_id.to_string(),
        full_content: addressed,
        conversation_id: Some(conversation_id),
        error: None,
    })
    .await
    .map_err(|_| Error::Transient("broker outbound channel closed".into()))
}

async fn send_message(State(state): State<Arc<McpBridgeState>>, Json(req): Json<SendMessageRequest>) -> Json<serde_json::Value> {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    match inject(&state, &req.agent_id, &req.room_id, &req.target_agent_name, &req.content, conversation_id).await {
        Ok(()) => Json(serde_json::json!({"ok": true})),
        Err(e) => Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    }
}

async fn request_reply(State(state): State<Arc<McpBridgeState>>, Json(req): Json<RequestReplyRequest>) -> Json<serde_json::Value> {
    let conversation_id = uuid::Uuid::new_v4().to_string();
    let timeout_secs = req.timeout_sec.unwrap_or(MAX_REPLY_TIMEOUT_SECS).min(MAX_REPLY_TIMEOUT_SECS);

    let rx = match state.pending_replies.register(&req.agent_id, &conversation_id) {
        Ok(rx) => rx,
        Err(e) => return Json(serde_json::json!({"ok": false, "error": e.to_string()})),
    };

    if let Err(e) = inject(&state, &req.agent_id, &req.room_id, &req.target_agent_name, &req.content, conversation_id.clone()).await {
        state.pending_replies.unregister(&req.agent_id, &conversation_id);
        return Json(serde_json::json!({"ok": false, "error": e.to_string()}));
    }

    match tokio::time::timeout(Duration::from_secs(timeout_secs), rx).await {
        Ok(Ok(content)) => Json(serde_json::json!({"ok": true, "data": ReplyResponse { content } })),
        Ok(Err(_)) => Json(serde_json::json!({"ok": false, "error": "reply channel closed"})),
        Err(_) => {
            state.pending_replies.unregister(&req.agent_id, &conversation_id);
            Json(serde_json::json!({"ok": false, "error": "timed out waiting for reply"}))
        }
    }
}

async fn room_messages(State(state): State<Arc<McpBridgeState>>, Query(q): Query<RoomQuery>) -> Json<serde_json::Value> {
    let Some(snapshot) = state.room_contexts.peek(&q.agent_id, &q.room_id) else {
        return Json(serde_json::json!({"ok": false, "error": "no room context cached for this agent/room"}));
    };
    let limit = q.limit.unwrap_or(20);
    let messages = snapshot.recent_messages.unwrap_or_default();
    let tail: Vec<_> = messages.into_iter().rev().take(limit).collect();
    Json(serde_json::json!({"ok": true, "data": tail}))
}

async fn room_members(State(state): State<Arc<McpBridgeState>>, Query(q): Query<RoomQuery>) -> Json<serde_json::Value> {
    let Some(snapshot) = state.room_contexts.peek(&q.agent_id, &q.room_id) else {
        return Json(serde_json::json!({"ok": false, "error": "no room context cached for this agent/room"}));
    };
    Json(serde_json::json!({"ok": true, "data": snapshot.members}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_caps_per_agent() {
        let store = PendingReplyStore::new();
        for i in 0..MAX_PENDING_REPLIES_PER_AGENT {
            assert!(store.register("a1", &format!("c{i}")).is_ok());
        }
        assert!(store.register("a1", "overflow").is_err());
    }

    #[tokio::test]
    async fn resolve_delivers_to_registered_receiver() {
        let store = PendingReplyStore::new();
        let rx = store.register("a1", "c1").unwrap();
        assert!(store.resolve("a1", "c1", "hi".into()));
        assert_eq!(rx.await.unwrap(), "hi");
    }

    #[test]
    fn resolve_unknown_conversation_returns_false() {
        let store = PendingReplyStore::new();
        assert!(!store.resolve("a1", "nope", "x".into()));
    }
}
