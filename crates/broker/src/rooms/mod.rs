//! In-memory room cache fronting the persistent room/member store.
//!
//! Room/member/message persistence is an out-of-scope external
//! collaborator (a relational DB); this module defines the
//! [`RoomBackend`] contract that store must satisfy and keeps a
//! synchronous-to-read cache in front of it so the routing engine never
//! blocks on I/O while holding the hub lock.

use std::collections::HashMap;

use agentim_domain::error::{Error, Result};
use agentim_domain::room::Room;
use async_trait::async_trait;
use parking_lot::RwLock;

#[async_trait]
pub trait RoomBackend: Send + Sync {
    async fn fetch_room(&self, room_id: &str) -> Result<Option<Room>>;
    async fn save_room(&self, room: &Room) -> Result<()>;
}

/// Cache of [`Room`] snapshots, refreshed on writes and lazily on a read
/// miss. Callers that need the routing-hot-path view (`route_user_message`,
/// `route_agent_reply`) should hold a short-lived clone rather than a
/// lock across `.await` points.
pub struct RoomStore {
    cache: RwLock<HashMap<String, Room>>,
    backend: Box<dyn RoomBackend>,
}

impl RoomStore {
    pub fn new(backend: Box<dyn RoomBackend>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Return a cached snapshot if present; otherwise load from the
    /// backend and populate the cache. The only suspension point here is
    /// the backend fetch on a cache miss.
    pub async fn get(&self, room_id: &str) -> Result<Room> {
        if let Some(room) = self.cache.read().get(room_id).cloned() {
            return Ok(room);
        }
        let room = self
            .backend
            .fetch_room(room_id)
            .await?
            .ok_or_else(|| Error::Validation(format!("room '{room_id}' not found")))?;
        self.cache.write().insert(room_id.to_string(), room.clone());
        Ok(room)
    }

    /// Fast, synchronous read of whatever is currently cached, without a
    /// backend fallback. Used by the routing engine's hot path, which
    /// must never await while holding the hub lock.
    pub fn peek(&self, room_id: &str) -> Option<Room> {
        self.cache.read().get(room_id).cloned()
    }

    pub async fn save(&self, room: Room) -> Result<()> {
        self.backend.save_room(&room).await?;
        self.cache.write().insert(room.id.clone(), room);
        Ok(())
    }

    pub fn invalidate(&self, room_id: &str) {
        self.cache.write().remove(room_id);
    }
}

/// Dependency-free default backend: rooms only ever live in the cache,
/// populated by [`RoomStore::save`] (the REST room-creation path). A real
/// deployment swaps this for a DB-backed [`RoomBackend`].
pub struct NullRoomBackend;

#[async_trait]
impl RoomBackend for NullRoomBackend {
    async fn fetch_room(&self, _room_id: &str) -> Result<Option<Room>> {
        Ok(None)
    }

    async fn save_room(&self, _room: &Room) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::room::{Member, MemberRole, MemberType, NotificationPreference};
    use std::sync::Mutex;

    struct StubBackend {
        rooms: Mutex<HashMap<String, Room>>,
    }

    #[async_trait]
    impl RoomBackend for StubBackend {
        async fn fetch_room(&self, room_id: &str) -> Result<Option<Room>> {
            Ok(self.rooms.lock().unwrap().get(room_id).cloned())
        }
        async fn save_room(&self, room: &Room) -> Result<()> {
            self.rooms.lock().unwrap().insert(room.id.clone(), room.clone());
            Ok(())
        }
    }

    fn sample_room() -> Room {
        Room {
            id: "r1".into(),
            name: "room".into(),
            broadcast_mode: false,
            system_prompt: None,
            members: vec![Member {
                id: "agent-a".into(),
                member_type: MemberType::Agent,
                name: "AlphaBot".into(),
                agent_type: Some("generic".into()),
                role: MemberRole::Member,
                notification_preference: NotificationPreference::All,
                pinned: false,
                archived: false,
                status: None,
            }],
        }
    }

    #[tokio::test]
    async fn miss_then_hit_populates_cache() {
        let mut rooms = HashMap::new();
        rooms.insert("r1".to_string(), sample_room());
        let store = RoomStore::new(Box::new(StubBackend {
            rooms: Mutex::new(rooms),
        }));
        assert!(store.peek("r1").is_none());
        let fetched = store.get("r1").await.unwrap();
        assert_eq!(fetched.id, "r1");
        assert!(store.peek("r1").is_some());
    }

    #[tokio::test]
    async fn unknown_room_errors() {
        let store = RoomStore::new(Box::new(StubBackend {
            rooms: Mutex::new(HashMap::new()),
        }));
        assert!(store.get("missing").await.is_err());
    }

    #[tokio::test]
    async fn save_updates_cache_and_backend() {
        let store = RoomStore::new(Box::new(StubBackend {
            rooms: Mutex::new(HashMap::new()),
        }));
        store.save(sample_room()).await.unwrap();
        assert!(store.peek("r1").is_some());
        assert_eq!(store.get("r1").await.unwrap().id, "r1");
    }
}
