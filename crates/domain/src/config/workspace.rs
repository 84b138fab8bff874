use serde::{Deserialize, Serialize};

/// Bounds on the workspace probe an adapter runs before a turn (VCS status,
/// directory listing, bounded file reads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "d_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "d_max_file_read_bytes")]
    pub max_file_read_bytes: usize,
    #[serde(default = "d_max_listing_entries")]
    pub max_listing_entries: usize,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: d_probe_timeout_secs(),
            max_file_read_bytes: d_max_file_read_bytes(),
            max_listing_entries: d_max_listing_entries(),
        }
    }
}

fn d_probe_timeout_secs() -> u64 {
    15
}
fn d_max_file_read_bytes() -> usize {
    256 * 1024
}
fn d_max_listing_entries() -> usize {
    500
}
