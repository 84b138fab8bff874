use serde::{Deserialize, Serialize};

/// Frame and connection limits applied to the three hub WebSocket endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsocketConfig {
    #[serde(default = "d_client_frame_bytes")]
    pub client_max_frame_bytes: usize,
    #[serde(default = "d_gateway_frame_bytes")]
    pub gateway_max_frame_bytes: usize,
    #[serde(default = "d_heartbeat_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "d_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    #[serde(default = "d_hello_timeout_secs")]
    pub hello_timeout_secs: u64,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            client_max_frame_bytes: d_client_frame_bytes(),
            gateway_max_frame_bytes: d_gateway_frame_bytes(),
            heartbeat_interval_secs: d_heartbeat_secs(),
            heartbeat_timeout_secs: d_heartbeat_timeout_secs(),
            hello_timeout_secs: d_hello_timeout_secs(),
        }
    }
}

fn d_client_frame_bytes() -> usize {
    64 * 1024
}
fn d_gateway_frame_bytes() -> usize {
    256 * 1024
}
fn d_heartbeat_secs() -> u64 {
    30
}
fn d_heartbeat_timeout_secs() -> u64 {
    90
}
fn d_hello_timeout_secs() -> u64 {
    10
}
