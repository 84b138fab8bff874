//! Ties the daemon's long-lived collaborators together: the outbound
//! broker client, its agent manager/permission/room-context handles, the
//! MCP bridge, and the session store. Constructed once in `main.rs` and
//! handed to whichever subsystem needs it.

use std::sync::Arc;

use agentim_domain::config::{AdaptersConfig, WorkspaceConfig};

use crate::client::GatewayClient;
use crate::mcp_bridge::McpBridgeState;
use crate::session_store::SessionStore;

pub struct GatewayState {
    pub client: GatewayClient,
    pub sessions: Arc<SessionStore>,
    pub mcp_bridge: Arc<McpBridgeState>,
}

impl GatewayState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_url: String,
        token: String,
        gateway_id: String,
        adapters_config: AdaptersConfig,
        workspace_config: WorkspaceConfig,
        sessions: Arc<SessionStore>,
        bypass_permissions: bool,
    ) -> Self {
        let client = GatewayClient::builder(server_url, token, gateway_id)
            .adapters_config(adapters_config)
            .workspace_config(workspace_config)
            .bypass_permissions(bypass_permissions)
            .build();

        let mcp_bridge = Arc::new(McpBridgeState {
            room_contexts: client.room_contexts(),
            outbound: client.outbound_slot(),
            pending_replies: client.pending_replies(),
        });

        Self { client, sessions, mcp_bridge }
    }
}
