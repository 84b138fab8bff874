use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentim_domain::agent::{Agent, AgentStatus};
use agentim_domain::chunk::Chunk;
use agentim_domain::room_context::RoomContextSnapshot;

/// Maximum frame size accepted on the gateway-facing socket; gateway
/// frames carry large tool-result chunks so the cap is generous.
pub const GATEWAY_MAX_FRAME_BYTES: usize = 256 * 1024;

/// Frames exchanged on `/ws/gateway`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayMessage {
    #[serde(rename = "gateway:auth")]
    Auth {
        token: String,
        gateway_id: String,
        version: String,
    },
    #[serde(rename = "server:gateway_auth_result")]
    AuthResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "gateway:register_agent")]
    RegisterAgent { agent: Agent },
    #[serde(rename = "gateway:unregister_agent")]
    UnregisterAgent { agent_id: String },
    #[serde(rename = "gateway:agent_status")]
    AgentStatus {
        agent_id: String,
        status: AgentStatus,
        queue_depth: usize,
    },

    #[serde(rename = "gateway:message_chunk")]
    MessageChunk {
        message_id: String,
        agent_id: String,
        room_id: String,
        chunk: Chunk,
    },
    #[serde(rename = "gateway:message_complete")]
    MessageComplete {
        message_id: String,
        agent_id: String,
        room_id: String,
        full_content: String,
        /// Echoed back from the `send_to_agent` envelope so the broker can
        /// keep the chain-safety check applied to any re-routed reply.
        #[serde(skip_serializing_if = "Option::is_none")]
        conversation_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "gateway:permission_request")]
    PermissionRequest {
        permission_id: String,
        agent_id: String,
        room_id: String,
        tool_name: String,
        tool_input: Value,
    },
    #[serde(rename = "gateway:permission_response")]
    PermissionResponse {
        permission_id: String,
        approved: bool,
    },
    #[serde(rename = "server:permission_response")]
    ServerPermissionResponse {
        permission_id: String,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    #[serde(rename = "gateway:spawn_result")]
    SpawnResult {
        agent_id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "gateway:workspace_response")]
    WorkspaceResponse {
        agent_id: String,
        request_id: String,
        data: Value,
    },

    #[serde(rename = "server:send_to_agent")]
    SendToAgent {
        agent_id: String,
        room_id: String,
        message_id: String,
        sender_name: String,
        conversation_id: Option<String>,
        depth: u32,
        content: String,
        context: RoomContextSnapshot,
    },
    #[serde(rename = "server:stop_agent")]
    StopAgent { agent_id: String },
    #[serde(rename = "server:remove_agent")]
    RemoveAgent { agent_id: String },
    #[serde(rename = "server:room_context")]
    RoomContext {
        agent_id: String,
        context: RoomContextSnapshot,
    },
    #[serde(rename = "server:agent_command")]
    AgentCommand {
        agent_id: String,
        command: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename = "server:query_agent_info")]
    QueryAgentInfo { agent_id: String },
    #[serde(rename = "server:spawn_agent")]
    SpawnAgent {
        agent_type: String,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
    #[serde(rename = "server:request_workspace")]
    RequestWorkspace {
        agent_id: String,
        request_id: String,
    },
}
