use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentim_domain::chunk::Chunk;
use agentim_domain::message::Attachment;
use agentim_domain::room_context::RoomContextSnapshot;

/// Maximum frame size accepted on the client-facing socket before an
/// oversized-frame `LimitError` is raised.
pub const CLIENT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Frames exchanged on `/ws/client`. Tagged by `type` so both directions
/// share one wire enum, matching the abridged taxonomy in the external
/// interfaces contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "client:auth")]
    Auth { token: String },
    #[serde(rename = "server:auth_result")]
    AuthResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "client:join_room")]
    JoinRoom { room_id: String },
    #[serde(rename = "client:leave_room")]
    LeaveRoom { room_id: String },

    #[serde(rename = "client:send_message")]
    SendMessage {
        room_id: String,
        content: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default)]
        mentions: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to: Option<String>,
    },
    #[serde(rename = "client:typing")]
    Typing { room_id: String, is_typing: bool },

    #[serde(rename = "client:agent_command")]
    AgentCommand {
        agent_id: String,
        command: String,
        #[serde(default)]
        args: Value,
    },
    #[serde(rename = "client:query_agent_info")]
    QueryAgentInfo { agent_id: String },

    #[serde(rename = "server:message")]
    Message {
        room_id: String,
        message: agentim_domain::message::Message,
    },
    #[serde(rename = "server:message_chunk")]
    MessageChunk {
        room_id: String,
        message_id: String,
        agent_id: String,
        chunk: Chunk,
    },
    #[serde(rename = "server:message_complete")]
    MessageComplete {
        room_id: String,
        message_id: String,
        agent_id: String,
        full_content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "server:room_context")]
    RoomContext {
        room_id: String,
        context: RoomContextSnapshot,
    },
    #[serde(rename = "server:agent_command_result")]
    AgentCommandResult {
        agent_id: String,
        ok: bool,
        #[serde(default)]
        data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename = "server:agent_info")]
    AgentInfo { agent: agentim_domain::agent::Agent },

    #[serde(rename = "server:permission_request")]
    PermissionRequest {
        permission_id: String,
        agent_id: String,
        room_id: String,
        tool_name: String,
        tool_input: Value,
        deadline: DateTime<Utc>,
    },
    #[serde(rename = "client:permission_response")]
    PermissionResponse {
        permission_id: String,
        approved: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// Echo of a just-submitted client decision, for UI reconciliation
    /// across the client's other open tabs/devices.
    #[serde(rename = "server:permission_response")]
    PermissionResponseEcho { permission_id: String, approved: bool },

    #[serde(rename = "server:read_receipt")]
    ReadReceipt {
        room_id: String,
        user_id: String,
        message_id: String,
    },
    #[serde(rename = "server:typing")]
    ServerTyping {
        room_id: String,
        user_id: String,
        is_typing: bool,
    },
}
