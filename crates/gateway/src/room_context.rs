//! Per-(agent, room) cache of the most recent [`RoomContextSnapshot`]
//! pushed down from the broker. Refreshed on any touch (send/receive/
//! dispatch) and evicted after an idle TTL by a periodic sweeper.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use agentim_domain::room_context::{RoomContextSnapshot, ROOM_CONTEXT_IDLE_TTL_SECS};
use parking_lot::RwLock;

struct Entry {
    snapshot: RoomContextSnapshot,
    last_touched: Instant,
}

#[derive(Default)]
pub struct RoomContextCache {
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl RoomContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, agent_id: &str, room_id: &str, snapshot: RoomContextSnapshot) {
        self.entries.write().insert(
            (agent_id.to_string(), room_id.to_string()),
            Entry {
                snapshot,
                last_touched: Instant::now(),
            },
        );
    }

    /// Return the cached snapshot and mark it touched, refreshing its
    /// idle clock.
    pub fn touch(&self, agent_id: &str, room_id: &str) -> Option<RoomContextSnapshot> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(&(agent_id.to_string(), room_id.to_string()))?;
        entry.last_touched = Instant::now();
        Some(entry.snapshot.clone())
    }

    pub fn peek(&self, agent_id: &str, room_id: &str) -> Option<RoomContextSnapshot> {
        self.entries
            .read()
            .get(&(agent_id.to_string(), room_id.to_string()))
            .map(|e| e.snapshot.clone())
    }

    /// Drop every entry idle longer than [`ROOM_CONTEXT_IDLE_TTL_SECS`].
    /// Returns the number evicted.
    pub fn sweep_idle(&self) -> usize {
        let ttl = Duration::from_secs(ROOM_CONTEXT_IDLE_TTL_SECS);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| e.last_touched.elapsed() < ttl);
        before - entries.len()
    }

    pub fn remove_agent(&self, agent_id: &str) {
        self.entries.write().retain(|(a, _), _| a != agent_id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot() -> RoomContextSnapshot {
        RoomContextSnapshot {
            room_id: "r1".into(),
            room_name: "room".into(),
            system_prompt: None,
            members: vec![],
            recent_messages: None,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn store_touch_and_peek() {
        let cache = RoomContextCache::new();
        cache.store("a1", "r1", snapshot());
        assert!(cache.peek("a1", "r1").is_some());
        assert!(cache.touch("a1", "r1").is_some());
        assert!(cache.touch("a1", "r2").is_none());
    }

    #[test]
    fn remove_agent_drops_all_its_rooms() {
        let cache = RoomContextCache::new();
        cache.store("a1", "r1", snapshot());
        cache.store("a1", "r2", snapshot());
        cache.store("a2", "r1", snapshot());
        cache.remove_agent("a1");
        assert_eq!(cache.len(), 1);
    }
}
