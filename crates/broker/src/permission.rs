//! Permission relay: holds pending tool-call approval requests the broker
//! forwarded from a gateway to a room's clients, and resolves them when a
//! client responds or the deadline passes.
//!
//! Mirrors the exec-approval pattern used elsewhere in this codebase: a
//! `oneshot::Sender` unblocks the task waiting on the decision, and a
//! reminder fires at `reminder_fraction` of the timeout if nobody has
//! answered yet.

use std::collections::HashMap;
use std::time::Duration;

use agentim_domain::permission::{PermissionRequest, PermissionState};
use agentim_domain::trace::TraceEvent;
use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
}

struct Pending {
    request: PermissionRequest,
    respond: oneshot::Sender<PermissionDecision>,
    reminder_sent: bool,
}

/// Thread-safe store of in-flight permission requests, keyed by request id.
pub struct PermissionStore {
    pending: RwLock<HashMap<String, Pending>>,
    timeout: Duration,
    reminder_fraction: f64,
}

impl PermissionStore {
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

    /// Register a new request and return the receiver the caller awaits
    /// (with its own timeout) for the decision.
    pub fn insert(&self, request: PermissionRequest) -> oneshot::Receiver<PermissionDecision> {
        let (tx, rx) = oneshot::channel();
        TraceEvent::PermissionRequested {
            permission_id: request.id.clone(),
            agent_id: request.agent_id.clone(),
            tool_name: request.tool_name.clone(),
        }
        .emit();
        self.pending.write().insert(
            request.id.clone(),
            Pending {
                request,
                respond: tx,
                reminder_sent: false,
            },
        );
        rx
    }

    /// Resolve a pending request. Returns `false` if it was already
    /// resolved or timed out.
    pub fn resolve(&self, id: &str, decision: PermissionDecision) -> bool {
        let Some(pending) = self.pending.write().remove(id) else {
            return false;
        };
        let elapsed_ms = Utc::now()
            .signed_duration_since(pending.request.created_at)
            .num_milliseconds()
            .max(0) as u64;
        TraceEvent::PermissionResolved {
            permission_id: id.to_string(),
            resolution: match decision {
                PermissionDecision::Allow => "allow".into(),
                PermissionDecision::Deny => "deny".into(),
            },
            elapsed_ms,
        }
        .emit();
        let _ = pending.respond.send(decision);
        true
    }

    /// Drop a request whose deadline has passed without a response.
    /// Returns the request so the caller can notify the gateway.
    pub fn expire(&self, id: &str) -> Option<PermissionRequest> {
        let removed = self.pending.write().remove(id).map(|p| p.request);
        if removed.is_some() {
            TraceEvent::PermissionTimedOut {
                permission_id: id.to_string(),
            }
            .emit();
        }
        removed
    }

    /// Mark a reminder sent, returning `false` if the request is gone or
    /// already reminded (idempotent against a racing resolve/expire).
    pub fn mark_reminder_sent(&self, id: &str) -> bool {
        let mut pending = self.pending.write();
        match pending.get_mut(id) {
            Some(p) if !p.reminder_sent => {
                p.reminder_sent = true;
                TraceEvent::PermissionReminderSent {
                    permission_id: id.to_string(),
                }
                .emit();
                true
            }
            _ => false,
        }
    }

    pub fn get_state(&self, id: &str) -> Option<PermissionState> {
        self.pending.read().get(id).map(|p| p.request.state)
    }

    pub fn list_pending_for_room(&self, room_id: &str) -> Vec<PermissionRequest> {
        self.pending
            .read()
            .values()
            .map(|p| &p.request)
            .filter(|r| r.room_id == room_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request(id: &str) -> PermissionRequest {
        let now = Utc::now();
        PermissionRequest {
            id: id.to_string(),
            agent_id: "agent-a".into(),
            room_id: "room-1".into(),
            tool_name: "bash".into(),
            tool_input: json!({"command": "ls"}),
            created_at: now,
            deadline: now + chrono::Duration::seconds(300),
            state: PermissionState::Pending,
        }
    }

    #[test]
    fn insert_and_resolve_allow() {
        let store = PermissionStore::new(300, 0.75);
        let rx = store.insert(sample_request("p1"));
        assert!(store.resolve("p1", PermissionDecision::Allow));
        assert_eq!(rx.blocking_recv().unwrap(), PermissionDecision::Allow);
        assert!(store.is_empty());
    }

    #[test]
    fn resolve_unknown_returns_false() {
        let store = PermissionStore::new(300, 0.75);
        assert!(!store.resolve("nope", PermissionDecision::Deny));
    }

    #[test]
    fn expire_removes_and_returns_request() {
        let store = PermissionStore::new(300, 0.75);
        let _rx = store.insert(sample_request("p1"));
        let expired = store.expire("p1").unwrap();
        assert_eq!(expired.id, "p1");
        assert!(store.is_empty());
    }

    #[test]
    fn reminder_sent_once() {
        let store = PermissionStore::new(300, 0.75);
        let _rx = store.insert(sample_request("p1"));
        assert!(store.mark_reminder_sent("p1"));
        assert!(!store.mark_reminder_sent("p1"));
    }

    #[test]
    fn reminder_delay_is_fraction_of_timeout() {
        let store = PermissionStore::new(300, 0.75);
        assert_eq!(store.reminder_delay(), Duration::from_secs_f64(225.0));
    }

    #[test]
    fn list_pending_filters_by_room() {
        let store = PermissionStore::new(300, 0.75);
        let _rx1 = store.insert(sample_request("p1"));
        let mut other = sample_request("p2");
        other.room_id = "room-2".into();
        let _rx2 = store.insert(other);
        let list = store.list_pending_for_room("room-1");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, "p1");
    }
}
