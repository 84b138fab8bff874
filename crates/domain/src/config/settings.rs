use serde::{Deserialize, Serialize};

/// Settings registry cache behavior (cache → DB → env → compiled default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "d_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: d_cache_ttl_secs(),
        }
    }
}

fn d_cache_ttl_secs() -> u64 {
    30
}
