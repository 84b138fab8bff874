use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The family of CLI/SDK a gateway adapter wraps.
///
/// Closed per build (§9 design notes): new families are added here, not
/// discovered at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    ClaudeCode,
    Codex,
    Gemini,
    Generic,
    /// Escape hatch for a custom adapter definition in `adapters.json`.
    Custom(String),
}

impl AgentType {
    pub fn as_str(&self) -> &str {
        match self {
            AgentType::ClaudeCode => "claude-code",
            AgentType::Codex => "codex",
            AgentType::Gemini => "gemini",
            AgentType::Generic => "generic",
            AgentType::Custom(name) => name.as_str(),
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentType {
    type Err = std::convert::Infallible;

    /// Built-in names map to their variant; anything else is treated as
    /// a reference into `adapters.json`'s custom definitions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "claude-code" => AgentType::ClaudeCode,
            "codex" => AgentType::Codex,
            "gemini" => AgentType::Gemini,
            "generic" => AgentType::Generic,
            other => AgentType::Custom(other.to_string()),
        })
    }
}

/// Runtime status of an agent as reported by its gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Busy,
    Error,
    Offline,
}

/// An AI participant addressable by name in rooms.
///
/// Exclusively owned by its [`Gateway`](crate::gateway::GatewayInfo):
/// when the gateway disconnects the agent goes offline, it is never
/// deleted implicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub agent_type: AgentType,
    pub owner_user_id: String,
    pub gateway_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub status: AgentStatus,
    #[serde(default)]
    pub queue_depth: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// Agent-name grammar used by the mention tokenizer: letters, digits,
/// `_`, `-`, and `.`, 1..=64 chars, must start with a letter or digit.
pub fn is_valid_agent_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 64 {
        return false;
    }
    let mut chars = name.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };
    if !first.is_ascii_alphanumeric() {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(is_valid_agent_name("AlphaBot"));
        assert!(is_valid_agent_name("codex-2"));
        assert!(is_valid_agent_name("a"));
    }

    #[test]
    fn invalid_names() {
        assert!(!is_valid_agent_name(""));
        assert!(!is_valid_agent_name("_leading"));
        assert!(!is_valid_agent_name("has space"));
        assert!(!is_valid_agent_name(&"x".repeat(65)));
    }
}
