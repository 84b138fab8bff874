use serde::{Deserialize, Serialize};

use crate::permission::{DEFAULT_PERMISSION_TIMEOUT_SECS, PERMISSION_REMINDER_FRACTION};

/// Interactive tool-call approval timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionConfig {
    #[serde(default = "d_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "d_reminder_fraction")]
    pub reminder_fraction: f64,
}

impl Default for PermissionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: d_timeout_secs(),
            reminder_fraction: d_reminder_fraction(),
        }
    }
}

fn d_timeout_secs() -> u64 {
    DEFAULT_PERMISSION_TIMEOUT_SECS
}
fn d_reminder_fraction() -> f64 {
    PERMISSION_REMINDER_FRACTION
}
