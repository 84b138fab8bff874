//! Adapter instance registry, keyed by agent id, plus the factory that
//! turns an [`AgentType`] + adapter config into a concrete [`Adapter`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentim_domain::agent::AgentType;
use agentim_domain::config::AdaptersConfig;
use agentim_domain::error::{Error, Result};
use parking_lot::RwLock;

use super::process::{ProcessAdapter, ProcessAdapterConfig, PromptVia};
use super::sdk::{NullSdkBackend, SdkAdapter};
use super::Adapter;

/// Built-in CLI command + args for the closed set of known agent types.
/// `Custom` types resolve through `AdaptersConfig::custom` instead.
fn builtin_command(agent_type: &AgentType) -> Option<(&'static str, Vec<&'static str>)> {
    match agent_type {
        AgentType::ClaudeCode => Some(("claude", vec!["-p", "--output-format", "stream-json"])),
        AgentType::Codex => Some(("codex", vec!["exec", "--json"])),
        AgentType::Gemini => Some(("gemini", vec!["--json"])),
        AgentType::Generic | AgentType::Custom(_) => None,
    }
}

/// Build a new [`Adapter`] instance for `agent_type`, consulting custom
/// definitions in `adapters_config` for `Generic`/`Custom` types.
pub fn build_adapter(
    agent_type: &AgentType,
    working_directory: Option<String>,
    adapters_config: &AdaptersConfig,
) -> Result<Arc<dyn Adapter>> {
    let turn_timeout = Duration::from_secs(adapters_config.turn_timeout_secs);
    let max_buffer_bytes = adapters_config.max_output_buffer_bytes;

    if let Some((command, args)) = builtin_command(agent_type) {
        return Ok(Arc::new(ProcessAdapter::new(ProcessAdapterConfig {
            command: command.to_string(),
            args: args.into_iter().map(String::from).collect(),
            env: HashMap::new(),
            prompt_via: PromptVia::Arg,
            working_directory,
            max_buffer_bytes,
            turn_timeout,
        })));
    }

    let name = agent_type.as_str();
    if let Some(custom) = adapters_config.custom.get(name) {
        return Ok(Arc::new(ProcessAdapter::new(ProcessAdapterConfig {
            command: custom.command.clone(),
            args: custom.args.clone(),
            env: custom.env.clone(),
            prompt_via: PromptVia::Arg,
            working_directory,
            max_buffer_bytes,
            turn_timeout,
        })));
    }

    if name == "generic" {
        // No custom definition and no built-in command: fall back to the
        // SDK seam so the agent registers but errors loudly on first use
        // instead of failing to spawn.
        return Ok(Arc::new(SdkAdapter::new(Box::new(NullSdkBackend))));
    }

    Err(Error::Config(format!(
        "no adapter definition for agent type '{name}' — add one to adapters.json"
    )))
}

/// Thread-safe registry of live adapter instances, keyed by agent id.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent_id: String, adapter: Arc<dyn Adapter>) {
        self.adapters.write().insert(agent_id, adapter);
    }

    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.read().get(agent_id).cloned()
    }

    pub fn remove(&self, agent_id: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.write().remove(agent_id)
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.adapters.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.read().is_empty()
    }
}
