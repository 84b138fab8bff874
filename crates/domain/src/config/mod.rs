mod adapters;
mod ai_router;
mod permission;
mod revocation;
mod routing;
mod server;
mod settings;
mod websocket;
mod workspace;

pub use adapters::*;
pub use ai_router::*;
pub use permission::*;
pub use revocation::*;
pub use routing::*;
pub use server::*;
pub use settings::*;
pub use websocket::*;
pub use workspace::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level broker/gateway configuration, assembled from TOML config file
/// defaults overridden by environment variables at bootstrap time.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub websocket: WebsocketConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub ai_router: AiRouterConfig,
    #[serde(default)]
    pub revocation: RevocationConfig,
    #[serde(default)]
    pub permission: PermissionConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means the configuration is usable as-is.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }
        if self.routing.max_chain_depth == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "routing.max_chain_depth".into(),
                message: "max_chain_depth must be greater than 0".into(),
            });
        }
        if self.websocket.client_max_frame_bytes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "websocket.client_max_frame_bytes".into(),
                message: "client_max_frame_bytes must be greater than 0".into(),
            });
        }
        if self.permission.timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "permission.timeout_secs".into(),
                message: "timeout_secs must be greater than 0".into(),
            });
        }
        if !(0.0..1.0).contains(&self.permission.reminder_fraction) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "permission.reminder_fraction".into(),
                message: "reminder_fraction must be in [0, 1)".into(),
            });
        }

        for (i, provider) in self.ai_router.providers.iter().enumerate() {
            if provider.base_url.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("ai_router.providers[{i}].base_url"),
                    message: "provider base_url must not be empty".into(),
                });
            } else if !provider.base_url.starts_with("http://")
                && !provider.base_url.starts_with("https://")
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("ai_router.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let errors: Vec<_> = Config::default()
            .validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn zero_chain_depth_is_error() {
        let mut cfg = Config::default();
        cfg.routing.max_chain_depth = 0;
        let issues = cfg.validate();
        assert!(issues.iter().any(|e| e.field == "routing.max_chain_depth"));
    }

    #[test]
    fn provider_bad_scheme_is_error() {
        let mut cfg = Config::default();
        cfg.ai_router.providers.push(AiProviderConfig {
            id: "p".into(),
            base_url: "ftp://example.com".into(),
            api_key_env: None,
            default_model: None,
        });
        let issues = cfg.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "ai_router.providers[0].base_url"));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = Config::default();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = issues
            .iter()
            .find(|e| e.field == "server.cors.allowed_origins")
            .unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }
}
