use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A long-lived outbound process hosting 1..N agents.
///
/// Identity is opaque and chosen by the gateway itself; reconnects re-use
/// the same id so room memberships and context caches survive a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub gateway_id: String,
    pub owner_user_id: String,
    pub version: String,
    pub connected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Agent ids this gateway has registered (may outlive the socket).
    #[serde(default)]
    pub agent_ids: Vec<String>,
}
