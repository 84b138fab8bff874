//! The gateway's on-disk state under `~/.agentim/`: connection config
//! (`config.json`) and optional custom adapter definitions
//! (`adapters.json`). The agent-session map lives separately in
//! [`crate::session_store`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use agentim_domain::config::{AdaptersConfig, CustomAdapterConfig};
use serde::{Deserialize, Serialize};

pub fn agentim_home() -> PathBuf {
    std::env::var("AGENTIM_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_home().join(".agentim"))
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

/// `~/.agentim/config.json` — everything the gateway needs to reconnect
/// without the user re-running `login`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub server_url: Option<String>,
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub gateway_id: Option<String>,
    /// The user identity `login` authenticated as; stamped onto agents
    /// this gateway spawns so the broker can enforce per-user limits.
    pub user_id: Option<String>,
    /// Per-adapter-type saved environment variables (e.g. API keys set up
    /// via `setup <type>`), keyed by `AgentType::as_str()`.
    #[serde(default)]
    pub saved_env: HashMap<String, HashMap<String, String>>,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).expect("GatewayConfig always serializes");
        std::fs::write(path, json)
    }
}

/// `~/.agentim/adapters.json` — custom adapter definitions layered onto
/// the built-in `claude`/`codex`/`gemini` commands.
#[derive(Debug, Clone, Default, Deserialize)]
struct AdaptersFile {
    #[serde(default)]
    adapters: HashMap<String, CustomAdapterConfig>,
}

/// Load custom adapter definitions from `path` and merge them into
/// `config.custom`, overriding any existing entries with the same name.
pub fn load_custom_adapters(path: &Path, config: &mut AdaptersConfig) {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return;
    };
    match serde_json::from_str::<AdaptersFile>(&contents) {
        Ok(file) => {
            for (name, def) in file.adapters {
                config.custom.insert(name, def);
            }
        }
        Err(e) => tracing::warn!(error = %e, path = %path.display(), "failed to parse adapters.json, ignoring"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_is_default() {
        let cfg = GatewayConfig::load(Path::new("/nonexistent/config.json"));
        assert!(cfg.server_url.is_none());
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = std::env::temp_dir().join(format!("agentim-cfg-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");
        let mut cfg = GatewayConfig::default();
        cfg.server_url = Some("wss://example.com/ws/gateway".into());
        cfg.gateway_id = Some("gw-1".into());
        cfg.save(&path).unwrap();

        let reloaded = GatewayConfig::load(&path);
        assert_eq!(reloaded.server_url.as_deref(), Some("wss://example.com/ws/gateway"));
        assert_eq!(reloaded.gateway_id.as_deref(), Some("gw-1"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_adapters_file_leaves_config_unchanged() {
        let mut cfg = AdaptersConfig::with_defaults();
        load_custom_adapters(Path::new("/nonexistent/adapters.json"), &mut cfg);
        assert!(cfg.custom.is_empty());
    }

    #[test]
    fn loads_and_merges_custom_adapters() {
        let dir = std::env::temp_dir().join(format!("agentim-adapters-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("adapters.json");
        std::fs::write(
            &path,
            r#"{"adapters":{"my-bot":{"command":"my-bot","args":["--json"],"env":{}}}}"#,
        )
        .unwrap();

        let mut cfg = AdaptersConfig::with_defaults();
        load_custom_adapters(&path, &mut cfg);
        assert!(cfg.custom.contains_key("my-bot"));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
