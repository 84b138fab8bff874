//! Builder pattern for constructing a [`GatewayClient`].

use std::sync::Arc;
use std::time::Duration;

use agentim_domain::config::{AdaptersConfig, WorkspaceConfig};

use crate::agent_manager::AgentManager;
use crate::client::reconnect::ReconnectBackoff;
use crate::client::GatewayClient;
use crate::mcp_bridge::PendingReplyStore;
use crate::permission::GatewayPermissionStore;
use crate::room_context::RoomContextCache;

pub struct GatewayClientBuilder {
    server_url: String,
    token: String,
    gateway_id: String,
    version: String,
    auth_timeout: Duration,
    reconnect_backoff: ReconnectBackoff,
    adapters_config: AdaptersConfig,
    workspace_config: WorkspaceConfig,
    permission_timeout_secs: u64,
    permission_reminder_fraction: f64,
    bypass_permissions: bool,
}

impl GatewayClientBuilder {
    pub fn new(server_url: impl Into<String>, token: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            gateway_id: gateway_id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth_timeout: Duration::from_secs(10),
            reconnect_backoff: ReconnectBackoff::default(),
            adapters_config: AdaptersConfig::with_defaults(),
            workspace_config: WorkspaceConfig::default(),
            permission_timeout_secs: 300,
            permission_reminder_fraction: 0.75,
            bypass_permissions: false,
        }
    }

    pub fn reconnect_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    pub fn adapters_config(mut self, config: AdaptersConfig) -> Self {
        self.adapters_config = config;
        self
    }

    pub fn workspace_config(mut self, config: WorkspaceConfig) -> Self {
        self.workspace_config = config;
        self
    }

    pub fn permissions(mut self, timeout_secs: u64, reminder_fraction: f64) -> Self {
        self.permission_timeout_secs = timeout_secs;
        self.permission_reminder_fraction = reminder_fraction;
        self
    }

    /// `-y`/`--yes` on the daemon CLI: every tool-permission check
    /// auto-allows instead of round-tripping to the broker.
    pub fn bypass_permissions(mut self, bypass: bool) -> Self {
        self.bypass_permissions = bypass;
        self
    }

    pub fn build(self) -> GatewayClient {
        let room_contexts = Arc::new(RoomContextCache::new());
        let permissions = Arc::new(GatewayPermissionStore::new(self.permission_timeout_secs, self.permission_reminder_fraction));
        let agent_manager = Arc::new(AgentManager::new(
            self.adapters_config,
            self.workspace_config,
            room_contexts.clone(),
            permissions.clone(),
            self.bypass_permissions,
        ));
        let pending_replies = Arc::new(PendingReplyStore::new());

        GatewayClient {
            server_url: self.server_url,
            token: self.token,
            gateway_id: self.gateway_id,
            version: self.version,
            auth_timeout: self.auth_timeout,
            reconnect_backoff: self.reconnect_backoff,
            agent_manager,
            permissions,
            room_contexts,
            pending_replies,
            outbound_slot: Arc::new(parking_lot::Mutex::new(None)),
        }
    }
}
