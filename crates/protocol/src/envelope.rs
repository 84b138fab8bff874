use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agentim_domain::room_context::RoomContextSnapshot;

/// What the routing engine hands to `send_to_agent`: everything the
/// gateway's agent manager needs to enqueue a turn without a second
/// round-trip to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEnvelope {
    pub message_id: String,
    pub agent_id: String,
    pub room_id: String,
    pub sender_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub depth: u32,
    pub is_mentioned: bool,
    pub context: RoomContextSnapshot,
    pub dispatched_at: DateTime<Utc>,
}
