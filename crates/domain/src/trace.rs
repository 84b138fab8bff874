use serde::Serialize;

/// Structured trace events emitted across the broker and gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    MessageReceived {
        room_id: String,
        message_id: String,
        sender_type: String,
    },
    MentionsParsed {
        message_id: String,
        mentioned: Vec<String>,
        routing_mode: String,
    },
    RoutingDecision {
        message_id: String,
        room_id: String,
        target_agent_ids: Vec<String>,
        routing_mode: String,
        conversation_id: Option<String>,
        depth: u32,
    },
    ChainBlocked {
        conversation_id: String,
        agent_id: String,
        reason: String,
    },
    ChainDispatched {
        conversation_id: String,
        agent_id: String,
        depth: u32,
    },
    AgentBusyRejected {
        agent_id: String,
        queue_depth: usize,
    },
    AgentQueueDepthChanged {
        agent_id: String,
        queue_depth: usize,
    },
    RateLimited {
        agent_id: String,
        limit_kind: String,
    },
    PermissionRequested {
        permission_id: String,
        agent_id: String,
        tool_name: String,
    },
    PermissionResolved {
        permission_id: String,
        resolution: String,
        elapsed_ms: u64,
    },
    PermissionReminderSent {
        permission_id: String,
    },
    PermissionTimedOut {
        permission_id: String,
    },
    TokenRevocationChecked {
        token_hash_prefix: String,
        revoked: bool,
        source: String,
    },
    TokenRevoked {
        token_hash_prefix: String,
    },
    SettingRead {
        key: String,
        source: String,
    },
    SettingWritten {
        key: String,
    },
    SsrfBlocked {
        host: String,
        reason: String,
    },
    AdapterSpawned {
        agent_id: String,
        adapter_type: String,
    },
    AdapterExited {
        agent_id: String,
        exit_code: Option<i32>,
    },
    GatewayConnected {
        gateway_id: String,
    },
    GatewayDisconnected {
        gateway_id: String,
        reason: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "agentim_event");
    }
}
