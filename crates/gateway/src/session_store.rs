//! Persists `agentId -> sessionId` so an SDK-backed agent can resume its
//! conversation context across gateway reconnects/restarts, and loads/
//! saves the whole map to `~/.agentim/sessions.json`.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    sessions: HashMap<String, String>,
}

pub struct SessionStore {
    path: PathBuf,
    sessions: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn load(path: PathBuf) -> Self {
        let sessions = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<SessionFile>(&s).ok())
            .map(|f| f.sessions)
            .unwrap_or_default();
        Self {
            path,
            sessions: RwLock::new(sessions),
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<String> {
        self.sessions.read().get(agent_id).cloned()
    }

    pub fn set(&self, agent_id: &str, session_id: String) {
        self.sessions.write().insert(agent_id.to_string(), session_id);
        self.persist();
    }

    pub fn remove(&self, agent_id: &str) {
        self.sessions.write().remove(agent_id);
        self.persist();
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    fn persist(&self) {
        let file = SessionFile {
            sessions: self.sessions.read().clone(),
        };
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&file) {
            if let Err(e) = std::fs::write(&self.path, json) {
                tracing::warn!(error = %e, "failed to persist session store");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("agentim-session-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("sessions.json");

        let store = SessionStore::load(path.clone());
        store.set("agent-1", "sess-abc".into());
        assert_eq!(store.get("agent-1").as_deref(), Some("sess-abc"));

        let reloaded = SessionStore::load(path);
        assert_eq!(reloaded.get("agent-1").as_deref(), Some("sess-abc"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_starts_empty() {
        let store = SessionStore::load(PathBuf::from("/nonexistent/agentim-sessions.json"));
        assert_eq!(store.get("anything"), None);
    }
}
