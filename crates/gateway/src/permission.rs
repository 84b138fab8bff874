//! Gateway-side permission state machine: tracks requests an adapter
//! raised via its `onPermissionRequest` hook while awaiting the broker's
//! relayed answer from the user's web client.
//!
//! Mirrors the broker's own permission relay (itself grounded on the
//! exec-approval pattern): a `oneshot::Sender` unblocks the adapter call
//! site, and a reminder fires once at `reminder_fraction` of the timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentim_domain::chunk::Chunk;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;

use agentim_protocol::GatewayMessage;

use crate::agent_manager::GatewaySink;
use crate::adapter::ChunkSender;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
}

struct Pending {
    respond: oneshot::Sender<PermissionDecision>,
    reminder_sent: bool,
}

pub struct GatewayPermissionStore {
    pending: RwLock<HashMap<String, Pending>>,
    timeout: Duration,
    reminder_fraction: f64,
}

impl GatewayPermissionStore {
    pub fn new(timeout_secs: u64, reminder_fraction: f64) -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
            timeout: Duration::from_secs(timeout_secs),
            reminder_fraction,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn reminder_delay(&self) -> Duration {
        Duration::from_secs_f64(self.timeout.as_secs_f64() * self.reminder_fraction)
    }

    /// Register a new request, indexed by `request_id`. Returns the
    /// receiver the caller awaits (racing the reminder/deadline itself).
    pub fn insert(&self, request_id: String) -> oneshot::Receiver<PermissionDecision> {
        let (tx, rx) = oneshot::channel();
        self.pending.write().insert(
            request_id,
            Pending {
                respond: tx,
                reminder_sent: false,
            },
        );
        rx
    }

    /// Resolve a pending request. A single resolve wins; a second
    /// resolve (e.g. a racing deny-all during shutdown) is silently
    /// suppressed rather than erroring.
    pub fn resolve(&self, request_id: &str, decision: PermissionDecision) -> bool {
        match self.pending.write().remove(request_id) {
            Some(pending) => {
                let _ = pending.respond.send(decision);
                true
            }
            None => false,
        }
    }

    /// Mark a reminder sent; returns `false` if already reminded or gone.
    pub fn mark_reminder_sent(&self, request_id: &str) -> bool {
        match self.pending.write().get_mut(request_id) {
            Some(p) if !p.reminder_sent => {
                p.reminder_sent = true;
                true
            }
            _ => false,
        }
    }

    /// Resolve every outstanding request as deny — called once on
    /// graceful shutdown (`disposeAll`).
    pub fn deny_all(&self) {
        let pending: Vec<_> = self.pending.write().drain().collect();
        for (_, p) in pending {
            let _ = p.respond.send(PermissionDecision::Deny);
        }
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }
}

/// Race the broker's answer against a one-shot reminder and a hard
/// deadline. `on_reminder` fires at most once and is meant to push a
/// chat-visible notice; it does not itself resolve the request.
pub async fn await_decision(
    rx: oneshot::Receiver<PermissionDecision>,
    reminder_delay: Duration,
    total_timeout: Duration,
    store: &GatewayPermissionStore,
    request_id: &str,
    on_reminder: impl FnOnce(),
    on_timeout: impl FnOnce(),
) -> PermissionDecision {
    let deadline = tokio::time::sleep(total_timeout);
    let reminder = tokio::time::sleep(reminder_delay);
    tokio::pin!(deadline, reminder, rx);
    let mut reminder_fired = false;
    let mut on_reminder = Some(on_reminder);

    loop {
        tokio::select! {
            result = &mut rx => {
                return result.unwrap_or(PermissionDecision::Deny);
            }
            _ = &mut reminder, if !reminder_fired => {
                reminder_fired = true;
                if store.mark_reminder_sent(request_id) {
                    if let Some(f) = on_reminder.take() {
                        f();
                    }
                }
            }
            _ = &mut deadline => {
                store.resolve(request_id, PermissionDecision::Deny);
                on_timeout();
                return PermissionDecision::Deny;
            }
        }
    }
}

/// Bridges an adapter's mid-turn "may I use this tool?" check to the
/// broker-relayed answer. Built fresh per turn so the right agent/room
/// ids and chunk stream are attached. In `bypass` mode every request is
/// allowed immediately with no round trip.
#[derive(Clone)]
pub struct PermissionHook {
    store: Arc<GatewayPermissionStore>,
    outbound: GatewaySink,
    chunks: ChunkSender,
    agent_id: String,
    room_id: String,
    bypass: bool,
}

impl PermissionHook {
    pub fn new(store: Arc<GatewayPermissionStore>, outbound: GatewaySink, chunks: ChunkSender, agent_id: String, room_id: String, bypass: bool) -> Self {
        Self {
            store,
            outbound,
            chunks,
            agent_id,
            room_id,
            bypass,
        }
    }

    /// Always-allow hook for adapters/tests that never need a real
    /// round trip (e.g. `bypass` mode has no broker to ask).
    pub fn noop_allow() -> Self {
        let (outbound, _) = tokio::sync::mpsc::channel(1);
        let (chunks, _) = tokio::sync::mpsc::channel(1);
        Self::new(Arc::new(GatewayPermissionStore::new(300, 0.75)), outbound, chunks, String::new(), String::new(), true)
    }

    pub async fn ask(&self, tool_name: String, tool_input: Value) -> PermissionDecision {
        if self.bypass {
            return PermissionDecision::Allow;
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let rx = self.store.insert(request_id.clone());
        let _ = self
            .outbound
            .send(GatewayMessage::PermissionRequest {
                permission_id: request_id.clone(),
                agent_id: self.agent_id.clone(),
                room_id: self.room_id.clone(),
                tool_name: tool_name.clone(),
                tool_input,
            })
            .await;

        let reminder_chunks = self.chunks.clone();
        let reminder_tool = tool_name.clone();
        let timeout_chunks = self.chunks.clone();
        let timeout_tool = tool_name.clone();

        await_decision(
            rx,
            self.store.reminder_delay(),
            self.store.timeout(),
            &self.store,
            &request_id,
            move || {
                let chunks = reminder_chunks.clone();
                let tool_name = reminder_tool.clone();
                tokio::spawn(async move {
                    let _ = chunks
                        .send(Chunk::Text {
                            content: format!("_(still waiting for permission to use {tool_name}…)_"),
                        })
                        .await;
                });
            },
            move || {
                let chunks = timeout_chunks.clone();
                let tool_name = timeout_tool.clone();
                tokio::spawn(async move {
                    let _ = chunks
                        .send(Chunk::Text {
                            content: format!("_(permission request for {tool_name} timed out, denied)_"),
                        })
                        .await;
                });
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_allow_wins_over_timeout() {
        let store = GatewayPermissionStore::new(300, 0.75);
        let rx = store.insert("p1".into());
        store.resolve("p1", PermissionDecision::Allow);
        let decision = await_decision(rx, Duration::from_secs(225), Duration::from_secs(300), &store, "p1", || {}, || {}).await;
        assert_eq!(decision, PermissionDecision::Allow);
    }

    #[tokio::test]
    async fn timeout_resolves_deny() {
        let store = GatewayPermissionStore::new(1, 0.5);
        let rx = store.insert("p1".into());
        let decision = await_decision(rx, Duration::from_millis(10), Duration::from_millis(50), &store, "p1", || {}, || {}).await;
        assert_eq!(decision, PermissionDecision::Deny);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn bypass_hook_allows_without_a_round_trip() {
        let hook = PermissionHook::noop_allow();
        let decision = hook.ask("bash".into(), serde_json::json!({"command": "ls"})).await;
        assert_eq!(decision, PermissionDecision::Allow);
    }

    #[tokio::test]
    async fn interactive_hook_resolves_from_the_store() {
        let store = Arc::new(GatewayPermissionStore::new(300, 0.75));
        let (outbound, mut outbound_rx) = tokio::sync::mpsc::channel(4);
        let (chunks, _chunks_rx) = tokio::sync::mpsc::channel(4);
        let hook = PermissionHook::new(store.clone(), outbound, chunks, "agent-1".into(), "room-1".into(), false);

        let ask = tokio::spawn(async move { hook.ask("bash".into(), serde_json::json!({"command": "ls"})).await });

        let sent = outbound_rx.recv().await.expect("request sent to broker");
        let request_id = match sent {
            GatewayMessage::PermissionRequest { permission_id, .. } => permission_id,
            other => panic!("unexpected frame: {other:?}"),
        };
        store.resolve(&request_id, PermissionDecision::Allow);

        assert_eq!(ask.await.unwrap(), PermissionDecision::Allow);
    }

    #[test]
    fn double_resolve_is_silently_suppressed() {
        let store = GatewayPermissionStore::new(300, 0.75);
        let _rx = store.insert("p1".into());
        assert!(store.resolve("p1", PermissionDecision::Allow));
        assert!(!store.resolve("p1", PermissionDecision::Deny));
    }

    #[test]
    fn deny_all_resolves_every_pending_request() {
        let store = GatewayPermissionStore::new(300, 0.75);
        let rx1 = store.insert("p1".into());
        let rx2 = store.insert("p2".into());
        store.deny_all();
        assert_eq!(rx1.blocking_recv().unwrap(), PermissionDecision::Deny);
        assert_eq!(rx2.blocking_recv().unwrap(), PermissionDecision::Deny);
    }
}
