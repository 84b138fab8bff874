//! Owns every local adapter instance for this gateway process: per-agent
//! FIFO queues, status propagation, message assembly, and the
//! workspace-probe completion epilogue.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentim_domain::agent::{Agent, AgentStatus, AgentType};
use agentim_domain::chunk::Chunk;
use agentim_domain::config::{AdaptersConfig, WorkspaceConfig};
use agentim_domain::message::Message;
use agentim_domain::room_context::RoomContextSnapshot;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use agentim_protocol::GatewayMessage;

use crate::adapter::registry::{build_adapter, AdapterRegistry};
use crate::adapter::Adapter;
use crate::permission::{GatewayPermissionStore, PermissionHook};
use crate::room_context::RoomContextCache;
use crate::workspace;

/// Bound on a single agent's pending-turn queue. Overflow fails the
/// newest request rather than growing unbounded.
pub const MAX_AGENT_QUEUE_SIZE: usize = 50;

pub type GatewaySink = mpsc::Sender<GatewayMessage>;

struct QueuedTurn {
    message_id: String,
    room_id: String,
    content: String,
    sender_name: String,
    context: RoomContextSnapshot,
    conversation_id: Option<String>,
}

struct AgentHandle {
    agent_id: String,
    name: String,
    working_directory: Option<String>,
    adapter: Arc<dyn Adapter>,
    queue: Mutex<VecDeque<QueuedTurn>>,
    busy: AtomicBool,
}

/// Owns every agent this gateway process currently hosts.
pub struct AgentManager {
    handles: RwLock<HashMap<String, Arc<AgentHandle>>>,
    adapters: AdapterRegistry,
    adapters_config: AdaptersConfig,
    workspace_config: WorkspaceConfig,
    room_contexts: Arc<RoomContextCache>,
    permissions: Arc<GatewayPermissionStore>,
    /// `-y`/`--yes` on the daemon: every permission check auto-allows
    /// with no broker round trip.
    bypass_permissions: bool,
}

impl AgentManager {
    pub fn new(
        adapters_config: AdaptersConfig,
        workspace_config: WorkspaceConfig,
        room_contexts: Arc<RoomContextCache>,
        permissions: Arc<GatewayPermissionStore>,
        bypass_permissions: bool,
    ) -> Self {
        Self {
            handles: RwLock::new(HashMap::new()),
            adapters: AdapterRegistry::new(),
            adapters_config,
            workspace_config,
            room_contexts,
            permissions,
            bypass_permissions,
        }
    }

    /// Spawn and register a new agent, returning the [`Agent`] record to
    /// announce to the broker via `register_agent`.
    pub fn spawn_agent(
        &self,
        owner_user_id: String,
        gateway_id: String,
        name: String,
        agent_type: AgentType,
        working_directory: Option<String>,
    ) -> agentim_domain::error::Result<Agent> {
        let agent_id = uuid::Uuid::new_v4().to_string();
        let adapter = build_adapter(&agent_type, working_directory.clone(), &self.adapters_config)?;
        self.adapters.insert(agent_id.clone(), adapter.clone());

        let handle = Arc::new(AgentHandle {
            agent_id: agent_id.clone(),
            name: name.clone(),
            working_directory: working_directory.clone(),
            adapter,
            queue: Mutex::new(VecDeque::new()),
            busy: AtomicBool::new(false),
        });
        self.handles.write().insert(agent_id.clone(), handle);

        let now = Utc::now();
        Ok(Agent {
            id: agent_id,
            name,
            agent_type,
            owner_user_id,
            gateway_id,
            working_directory,
            capabilities: Vec::new(),
            status: AgentStatus::Online,
            queue_depth: 0,
            created_at: now,
            updated_at: now,
            last_seen_at: Some(now),
        })
    }

    /// Handle a `server:send_to_agent` frame: dispatch immediately if
    /// idle, else enqueue (bounded), else reject with an error turn.
    pub fn dispatch(
        &self,
        agent_id: &str,
        room_id: String,
        message_id: String,
        content: String,
        sender_name: String,
        context: RoomContextSnapshot,
        conversation_id: Option<String>,
        outbound: GatewaySink,
    ) {
        let Some(handle) = self.handles.read().get(agent_id).cloned() else {
            tracing::warn!(agent_id, "send_to_agent for unknown agent, dropping");
            return;
        };

        self.room_contexts.store(agent_id, &room_id, context.clone());

        let turn = QueuedTurn {
            message_id,
            room_id,
            content,
            sender_name,
            context,
            conversation_id,
        };

        if handle.busy.swap(true, Ordering::SeqCst) {
            let mut queue = handle.queue.lock();
            if queue.len() >= MAX_AGENT_QUEUE_SIZE {
                drop(queue);
                tokio::spawn(reject_overflow(turn, agent_id.to_string(), outbound));
                return;
            }
            let queue_depth = queue.len() + 1;
            queue.push_back(turn);
            drop(queue);
            tokio::spawn(push_status(agent_id.to_string(), AgentStatus::Busy, queue_depth, outbound));
            return;
        }

        let workspace_config = self.workspace_config.clone();
        let permissions = self.permissions.clone();
        let bypass = self.bypass_permissions;
        tokio::spawn(run_turn(handle, turn, outbound, workspace_config, permissions, bypass));
    }

    pub fn stop_agent(&self, agent_id: &str) {
        if let Some(handle) = self.handles.read().get(agent_id).cloned() {
            let adapter = handle.adapter.clone();
            handle.queue.lock().clear();
            tokio::spawn(async move { adapter.stop().await });
        }
    }

    pub fn remove_agent(&self, agent_id: &str) {
        self.stop_agent(agent_id);
        if let Some(handle) = self.handles.write().remove(agent_id) {
            let adapter = handle.adapter.clone();
            tokio::spawn(async move { adapter.dispose().await });
        }
        self.adapters.remove(agent_id);
        self.room_contexts.remove_agent(agent_id);
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.handles.read().keys().cloned().collect()
    }

    pub fn working_directory_of(&self, agent_id: &str) -> Option<String> {
        self.handles.read().get(agent_id)?.working_directory.clone()
    }

    pub fn adapter_for(&self, agent_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(agent_id)
    }

    /// Graceful shutdown: stop every adapter, race disposal against a
    /// 10 s timeout, then clear all in-memory state. Pending permissions
    /// are the caller's responsibility (`GatewayPermissionStore::deny_all`).
    pub async fn dispose_all(&self) {
        let handles: Vec<_> = self.handles.write().drain().map(|(_, h)| h).collect();
        let dispose_futures = handles.iter().map(|h| {
            let adapter = h.adapter.clone();
            async move { adapter.dispose().await }
        });
        let all = futures_util::future::join_all(dispose_futures);
        let _ = tokio::time::timeout(Duration::from_secs(10), all).await;
    }
}

async fn reject_overflow(turn: QueuedTurn, agent_id: String, outbound: GatewaySink) {
    let _ = outbound
        .send(GatewayMessage::MessageComplete {
            message_id: turn.message_id,
            agent_id,
            room_id: turn.room_id,
            full_content: String::new(),
            conversation_id: turn.conversation_id,
            error: Some(format!("agent queue full (max {MAX_AGENT_QUEUE_SIZE}), request dropped")),
        })
        .await;
}

async fn push_status(agent_id: String, status: AgentStatus, queue_depth: usize, outbound: GatewaySink) {
    let _ = outbound
        .send(GatewayMessage::AgentStatus {
            agent_id,
            status,
            queue_depth,
        })
        .await;
}

/// Build the turn's prompt: system prompt -> recent transcript -> sender
/// attribution -> user content. The exact format is a contract with the
/// adapter, not with the broker.
fn assemble_prompt(context: &RoomContextSnapshot, sender_name: &str, content: &str) -> String {
    let mut parts = Vec::new();
    if let Some(system_prompt) = &context.system_prompt {
        parts.push(system_prompt.clone());
    }
    if let Some(recent) = &context.recent_messages {
        if !recent.is_empty() {
            parts.push(format_transcript(recent));
        }
    }
    parts.push(format!("{sender_name}: {content}"));
    parts.join("\n\n")
}

fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender_name, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn run_turn(
    handle: Arc<AgentHandle>,
    turn: QueuedTurn,
    outbound: GatewaySink,
    workspace_config: WorkspaceConfig,
    permissions: Arc<GatewayPermissionStore>,
    bypass_permissions: bool,
) {
    push_status(handle.agent_id.clone(), AgentStatus::Busy, 0, outbound.clone()).await;

    let prompt = assemble_prompt(&turn.context, &turn.sender_name, &turn.content);
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<Chunk>(64);
    let permission_hook = PermissionHook::new(
        permissions.clone(),
        outbound.clone(),
        chunk_tx.clone(),
        handle.agent_id.clone(),
        turn.room_id.clone(),
        bypass_permissions,
    );

    let forward_agent_id = handle.agent_id.clone();
    let forward_message_id = turn.message_id.clone();
    let forward_room_id = turn.room_id.clone();
    let forward_outbound = outbound.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(chunk) = chunk_rx.recv().await {
            let _ = forward_outbound
                .send(GatewayMessage::MessageChunk {
                    message_id: forward_message_id.clone(),
                    agent_id: forward_agent_id.clone(),
                    room_id: forward_room_id.clone(),
                    chunk,
                })
                .await;
        }
    });

    let result = handle.adapter.send_message(prompt, turn.context.clone(), chunk_tx, permission_hook).await;
    let _ = forward_task.await;

    let (mut full_content, error) = match result {
        Ok(content) => (content, None),
        Err(e) => (String::new(), Some(e.to_string())),
    };

    if error.is_none() {
        if let Some(working_directory) = &handle.working_directory {
            let timeout = Duration::from_secs(workspace_config.probe_timeout_secs);
            if let Some(probe) = workspace::probe(working_directory, timeout).await {
                let summary = format!(
                    "workspace: {} ({} file(s) changed, +{}/-{})",
                    probe.branch, probe.summary.files_changed, probe.summary.additions, probe.summary.deletions
                );
                let status_chunk = Chunk::WorkspaceStatus {
                    content: summary,
                    working_directory: Some(working_directory.clone()),
                };
                let _ = outbound
                    .send(GatewayMessage::MessageChunk {
                        message_id: turn.message_id.clone(),
                        agent_id: handle.agent_id.clone(),
                        room_id: turn.room_id.clone(),
                        chunk: status_chunk,
                    })
                    .await;
            } else {
                full_content.push_str("\n\n_(workspace status unavailable)_");
            }
        }
    }

    let _ = outbound
        .send(GatewayMessage::MessageComplete {
            message_id: turn.message_id,
            agent_id: handle.agent_id.clone(),
            room_id: turn.room_id,
            full_content,
            conversation_id: turn.conversation_id,
            error,
        })
        .await;

    let next = handle.queue.lock().pop_front();
    match next {
        Some(next_turn) => {
            let queue_depth = handle.queue.lock().len();
            push_status(handle.agent_id.clone(), AgentStatus::Busy, queue_depth, outbound.clone()).await;
            Box::pin(run_turn(handle, next_turn, outbound, workspace_config, permissions, bypass_permissions)).await;
        }
        None => {
            handle.busy.store(false, Ordering::SeqCst);
            push_status(handle.agent_id.clone(), AgentStatus::Online, 0, outbound).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::room::Member;

    fn context_with_transcript() -> RoomContextSnapshot {
        RoomContextSnapshot {
            room_id: "r1".into(),
            room_name: "room".into(),
            system_prompt: Some("be helpful".into()),
            members: Vec::<Member>::new(),
            recent_messages: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn assemble_prompt_includes_system_prompt_and_sender() {
        let prompt = assemble_prompt(&context_with_transcript(), "alice", "hello");
        assert!(prompt.contains("be helpful"));
        assert!(prompt.contains("alice: hello"));
    }

    #[test]
    fn assemble_prompt_without_system_prompt_is_just_sender_line() {
        let mut ctx = context_with_transcript();
        ctx.system_prompt = None;
        let prompt = assemble_prompt(&ctx, "bob", "hi");
        assert_eq!(prompt, "bob: hi");
    }
}
