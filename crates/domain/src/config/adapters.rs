use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gateway-side adapter defaults and custom adapter definitions loaded from
/// `~/.agentim/adapters.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptersConfig {
    #[serde(default = "d_max_queue_depth")]
    pub max_agent_queue_depth: usize,
    #[serde(default = "d_max_buffer_bytes")]
    pub max_output_buffer_bytes: usize,
    #[serde(default = "d_turn_timeout_secs")]
    pub turn_timeout_secs: u64,
    /// Custom adapter definitions, keyed by adapter name.
    #[serde(default)]
    pub custom: HashMap<String, CustomAdapterConfig>,
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomAdapterConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl AdaptersConfig {
    pub fn with_defaults() -> Self {
        Self {
            max_agent_queue_depth: d_max_queue_depth(),
            max_output_buffer_bytes: d_max_buffer_bytes(),
            turn_timeout_secs: d_turn_timeout_secs(),
            custom: HashMap::new(),
        }
    }
}

fn d_max_queue_depth() -> usize {
    50
}
fn d_max_buffer_bytes() -> usize {
    8 * 1024 * 1024
}
fn d_turn_timeout_secs() -> u64 {
    1800
}
