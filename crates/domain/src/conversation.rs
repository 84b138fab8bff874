use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Serializable snapshot of a conversation chain, for admin/debug surfaces.
/// The live, mutated version (with its visited set) lives in the broker's
/// routing engine (`ChainStore`) — this is the at-rest shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationChainInfo {
    pub conversation_id: String,
    pub visited: Vec<String>,
    pub depth: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// In-process representation used by the routing engine before it is
/// serialized out. Kept here (rather than in the broker crate) so both
/// the broker and any offline analysis tooling share one definition.
#[derive(Debug, Clone)]
pub struct ConversationChain {
    pub conversation_id: String,
    pub visited: HashSet<String>,
    pub depth: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl ConversationChain {
    pub fn new(conversation_id: String, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            visited: HashSet::new(),
            depth: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    pub fn to_info(&self) -> ConversationChainInfo {
        ConversationChainInfo {
            conversation_id: self.conversation_id.clone(),
            visited: self.visited.iter().cloned().collect(),
            depth: self.depth,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}
