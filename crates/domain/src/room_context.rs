use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::room::Member;

/// Default number of recent messages included in a snapshot.
pub const DEFAULT_RECENT_MESSAGES: usize = 20;

/// Hard upper bound a caller may request via `contextLimit`.
pub const MAX_RECENT_MESSAGES: usize = 50;

/// How long an idle (agent, room) snapshot is kept cached before eviction.
pub const ROOM_CONTEXT_IDLE_TTL_SECS: u64 = 3600;

/// The view of a room an adapter is handed before a turn: identity,
/// membership, and a bounded tail of recent history. Built fresh per
/// dispatch and cached per (agent, room) pair until it goes idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomContextSnapshot {
    pub room_id: String,
    pub room_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recent_messages: Option<Vec<Message>>,
    pub generated_at: DateTime<Utc>,
}

impl RoomContextSnapshot {
    /// Clamp a caller-supplied `contextLimit` to the allowed range.
    pub fn clamp_limit(requested: Option<usize>) -> usize {
        requested
            .unwrap_or(DEFAULT_RECENT_MESSAGES)
            .min(MAX_RECENT_MESSAGES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_caps_at_hard_max() {
        assert_eq!(RoomContextSnapshot::clamp_limit(Some(1000)), MAX_RECENT_MESSAGES);
        assert_eq!(RoomContextSnapshot::clamp_limit(None), DEFAULT_RECENT_MESSAGES);
        assert_eq!(RoomContextSnapshot::clamp_limit(Some(5)), 5);
    }
}
