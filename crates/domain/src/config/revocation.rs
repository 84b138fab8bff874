use serde::{Deserialize, Serialize};

/// Token revocation propagation: in-memory set, pub/sub fan-out, and a DB
/// fallback for nodes that missed a pub/sub broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationConfig {
    #[serde(default = "d_pubsub_channel")]
    pub pubsub_channel: String,
    #[serde(default = "d_db_fallback_interval_secs")]
    pub db_fallback_interval_secs: u64,
    #[serde(default = "d_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            pubsub_channel: d_pubsub_channel(),
            db_fallback_interval_secs: d_db_fallback_interval_secs(),
            cache_capacity: d_cache_capacity(),
        }
    }
}

fn d_pubsub_channel() -> String {
    "agentim:token-revocations".into()
}
fn d_db_fallback_interval_secs() -> u64 {
    60
}
fn d_cache_capacity() -> usize {
    10_000
}
