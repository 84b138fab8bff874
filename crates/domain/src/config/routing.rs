use serde::{Deserialize, Serialize};

/// Default broadcast/direct/none routing behavior, and the chain-safety
/// limits the routing engine enforces for every dispatched message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "d_max_chain_depth")]
    pub max_chain_depth: u32,
    #[serde(default = "d_chain_ttl_secs")]
    pub chain_ttl_secs: u64,
    #[serde(default = "d_max_messages_per_minute")]
    pub max_messages_per_minute_per_agent: u32,
    #[serde(default = "d_max_mentions_per_message")]
    pub max_mentions_per_message: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: d_max_chain_depth(),
            chain_ttl_secs: d_chain_ttl_secs(),
            max_messages_per_minute_per_agent: d_max_messages_per_minute(),
            max_mentions_per_message: d_max_mentions_per_message(),
        }
    }
}

fn d_max_chain_depth() -> u32 {
    8
}
fn d_chain_ttl_secs() -> u64 {
    600
}
fn d_max_messages_per_minute() -> u32 {
    30
}
fn d_max_mentions_per_message() -> usize {
    10
}
