use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Permission mode an agent runs under. `Bypass` means tool calls execute
/// without a human gate (set via `-y/--yes` on the gateway CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionMode {
    Interactive,
    Bypass,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::Interactive
    }
}

/// Lifecycle state of a [`PermissionRequest`], mirroring the state machine
/// in the permission protocol design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Pending,
    ReminderSent,
    ResolvedAllow,
    ResolvedDeny,
}

/// An ephemeral request created when an agent attempts a tool call while
/// running in `interactive` mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: String,
    pub agent_id: String,
    pub room_id: String,
    pub tool_name: String,
    pub tool_input: Value,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub state: PermissionState,
}

/// Default approval timeout, per §3 Permission Request lifecycle.
pub const DEFAULT_PERMISSION_TIMEOUT_SECS: u64 = 300;

/// Fraction of the timeout at which a reminder notice is emitted.
pub const PERMISSION_REMINDER_FRACTION: f64 = 0.75;
