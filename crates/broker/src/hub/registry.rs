//! In-memory registries for everything connected to the hub: client
//! sockets, gateway sockets, and the agents those gateways have
//! registered.

use std::collections::HashMap;

use agentim_domain::agent::{Agent, AgentStatus};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use agentim_protocol::ClientMessage;
use agentim_protocol::GatewayMessage;

pub type ClientSink = mpsc::Sender<ClientMessage>;
pub type GatewaySink = mpsc::Sender<GatewayMessage>;

/// A single authenticated client socket.
pub struct ConnectedClient {
    pub connection_id: String,
    pub user_id: String,
    pub rooms: Vec<String>,
    pub connected_at: DateTime<Utc>,
    pub sink: ClientSink,
}

/// A single authenticated gateway socket.
pub struct ConnectedGateway {
    pub gateway_id: String,
    pub owner_user_id: String,
    pub version: String,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub sink: GatewaySink,
}

/// Thread-safe registry of connected clients, keyed by connection id. A
/// single user may hold several concurrent connections (multiple tabs).
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ConnectedClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, client: ConnectedClient) {
        self.clients.write().insert(client.connection_id.clone(), client);
    }

    pub fn remove(&self, connection_id: &str) {
        self.clients.write().remove(connection_id);
    }

    pub fn join_room(&self, connection_id: &str, room_id: &str) {
        if let Some(c) = self.clients.write().get_mut(connection_id) {
            if !c.rooms.iter().any(|r| r == room_id) {
                c.rooms.push(room_id.to_string());
            }
        }
    }

    pub fn leave_room(&self, connection_id: &str, room_id: &str) {
        if let Some(c) = self.clients.write().get_mut(connection_id) {
            c.rooms.retain(|r| r != room_id);
        }
    }

    /// Sinks for every connection currently joined to `room_id`.
    pub fn sinks_for_room(&self, room_id: &str) -> Vec<ClientSink> {
        self.clients
            .read()
            .values()
            .filter(|c| c.rooms.iter().any(|r| r == room_id))
            .map(|c| c.sink.clone())
            .collect()
    }

    pub fn sinks_for_user(&self, user_id: &str) -> Vec<ClientSink> {
        self.clients
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.sink.clone())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }

    pub fn connection_count_for_user(&self, user_id: &str) -> usize {
        self.clients.read().values().filter(|c| c.user_id == user_id).count()
    }
}

/// Thread-safe registry of connected gateways.
#[derive(Default)]
pub struct GatewayRegistry {
    gateways: RwLock<HashMap<String, ConnectedGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, gateway: ConnectedGateway) {
        self.gateways.write().insert(gateway.gateway_id.clone(), gateway);
    }

    pub fn remove(&self, gateway_id: &str) {
        self.gateways.write().remove(gateway_id);
    }

    pub fn touch(&self, gateway_id: &str) {
        if let Some(g) = self.gateways.write().get_mut(gateway_id) {
            g.last_seen = Utc::now();
        }
    }

    pub fn sink(&self, gateway_id: &str) -> Option<GatewaySink> {
        self.gateways.read().get(gateway_id).map(|g| g.sink.clone())
    }

    pub fn is_connected(&self, gateway_id: &str) -> bool {
        self.gateways.read().contains_key(gateway_id)
    }

    pub fn prune_stale(&self, timeout_secs: i64) {
        let now = Utc::now();
        let mut gateways = self.gateways.write();
        gateways.retain(|_, g| now.signed_duration_since(g.last_seen).num_seconds() < timeout_secs);
    }
}

/// Thread-safe registry of agents across all gateways, keyed by agent id.
/// The routing engine reads this to resolve mention names within a room
/// to a concrete `(agent_id, gateway_id)` pair.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, agent: Agent) {
        self.agents.write().insert(agent.id.clone(), agent);
    }

    pub fn remove(&self, agent_id: &str) {
        self.agents.write().remove(agent_id);
    }

    /// Mark every agent owned by `gateway_id` offline (on gateway disconnect).
    pub fn mark_gateway_offline(&self, gateway_id: &str) {
        for agent in self.agents.write().values_mut() {
            if agent.gateway_id == gateway_id {
                agent.status = AgentStatus::Offline;
            }
        }
    }

    pub fn set_status(&self, agent_id: &str, status: AgentStatus, queue_depth: usize) {
        if let Some(a) = self.agents.write().get_mut(agent_id) {
            a.status = status;
            a.queue_depth = queue_depth;
        }
    }

    pub fn get(&self, agent_id: &str) -> Option<Agent> {
        self.agents.read().get(agent_id).cloned()
    }

    pub fn gateway_for_agent(&self, agent_id: &str) -> Option<String> {
        self.agents.read().get(agent_id).map(|a| a.gateway_id.clone())
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, gateway_id: &str) -> Agent {
        Agent {
            id: id.into(),
            name: id.into(),
            agent_type: agentim_domain::agent::AgentType::Generic,
            owner_user_id: "u1".into(),
            gateway_id: gateway_id.into(),
            working_directory: None,
            capabilities: vec![],
            status: AgentStatus::Online,
            queue_depth: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_seen_at: None,
        }
    }

    #[test]
    fn client_registry_tracks_room_membership() {
        let reg = ClientRegistry::new();
        let (tx, _rx) = mpsc::channel(4);
        reg.register(ConnectedClient {
            connection_id: "c1".into(),
            user_id: "u1".into(),
            rooms: vec![],
            connected_at: Utc::now(),
            sink: tx,
        });
        reg.join_room("c1", "room1");
        assert_eq!(reg.sinks_for_room("room1").len(), 1);
        reg.leave_room("c1", "room1");
        assert_eq!(reg.sinks_for_room("room1").len(), 0);
    }

    #[test]
    fn gateway_offline_marks_its_agents() {
        let agents = AgentRegistry::new();
        agents.upsert(agent("a1", "gw1"));
        agents.upsert(agent("a2", "gw2"));
        agents.mark_gateway_offline("gw1");
        assert_eq!(agents.get("a1").unwrap().status, AgentStatus::Offline);
        assert_eq!(agents.get("a2").unwrap().status, AgentStatus::Online);
    }

    #[test]
    fn connection_count_per_user() {
        let reg = ClientRegistry::new();
        let (tx1, _r1) = mpsc::channel(4);
        let (tx2, _r2) = mpsc::channel(4);
        reg.register(ConnectedClient {
            connection_id: "c1".into(),
            user_id: "u1".into(),
            rooms: vec![],
            connected_at: Utc::now(),
            sink: tx1,
        });
        reg.register(ConnectedClient {
            connection_id: "c2".into(),
            user_id: "u1".into(),
            rooms: vec![],
            connected_at: Utc::now(),
            sink: tx2,
        });
        assert_eq!(reg.connection_count_for_user("u1"), 2);
        assert_eq!(reg.connection_count(), 2);
    }
}
