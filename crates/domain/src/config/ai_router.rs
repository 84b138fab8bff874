use serde::{Deserialize, Serialize};

/// Outbound HTTP sub-routing client used to reach configured model
/// providers. Every outbound URL is checked against the SSRF guard before
/// a connection is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiRouterConfig {
    #[serde(default)]
    pub providers: Vec<AiProviderConfig>,
    #[serde(default = "d_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Extra hosts the SSRF guard permits beyond the allowlisted providers,
    /// e.g. an internal LLM gateway on the corporate network.
    #[serde(default)]
    pub extra_allowed_hosts: Vec<String>,
}

impl Default for AiRouterConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            request_timeout_secs: d_request_timeout_secs(),
            extra_allowed_hosts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}

fn d_request_timeout_secs() -> u64 {
    60
}
