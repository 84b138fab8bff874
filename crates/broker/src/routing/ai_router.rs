//! AI Router sub-routing: when a broadcast-mode room receives an
//! unmentioned message, this client asks a configured external model
//! which room agents should respond, then hands a ranked name list back
//! to [`super::engine::finish_broadcast_routing`].
//!
//! Every outbound request is checked against the SSRF guard immediately
//! before the connection is opened — not just at config-load time — so a
//! DNS record that changes after startup can't bypass the check.

use std::time::Duration;

use agentim_domain::config::AiProviderConfig;
use agentim_domain::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::security::ssrf;

#[derive(Debug, Clone, Serialize)]
struct SubRouteRequest<'a> {
    room_name: &'a str,
    system_prompt: Option<&'a str>,
    agent_names: &'a [String],
    recent_messages: &'a [String],
    content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct SubRouteResponse {
    #[serde(default)]
    chosen_agents: Vec<String>,
}

/// Stateless client over the configured provider list; tries providers in
/// order, falling back on transient failures the way the underlying LLM
/// router fails over between primary and fallback models.
pub struct AiRouterClient {
    http: Client,
    providers: Vec<AiProviderConfig>,
    timeout: Duration,
}

impl AiRouterClient {
    pub fn new(providers: Vec<AiProviderConfig>, request_timeout_secs: u64) -> Self {
        Self {
            http: Client::new(),
            providers,
            timeout: Duration::from_secs(request_timeout_secs),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Ask the router which agents should respond to an unmentioned
    /// broadcast message. Returns an empty list (not an error) when no
    /// provider is reachable — the caller treats that the same as "no
    /// agent chosen", per the broadcast routing contract.
    pub async fn choose_agents(
        &self,
        room_name: &str,
        system_prompt: Option<&str>,
        agent_names: &[String],
        recent_messages: &[String],
        content: &str,
    ) -> Vec<String> {
        let body = SubRouteRequest {
            room_name,
            system_prompt,
            agent_names,
            recent_messages,
            content,
        };

        for provider in &self.providers {
            match self.try_provider(provider, &body).await {
                Ok(chosen) => return chosen,
                Err(e) if e.is_transient() => {
                    tracing::warn!(provider = %provider.id, error = %e, "sub-router provider failed, trying next");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(provider = %provider.id, error = %e, "sub-router provider rejected request");
                    continue;
                }
            }
        }

        Vec::new()
    }

    async fn try_provider(
        &self,
        provider: &AiProviderConfig,
        body: &SubRouteRequest<'_>,
    ) -> Result<Vec<String>> {
        ssrf::guard_url(&provider.base_url).await?;

        let mut request = self.http.post(&provider.base_url).json(body);
        if let Some(env_key) = &provider.api_key_env {
            if let Ok(key) = std::env::var(env_key) {
                request = request.bearer_auth(key);
            }
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| Error::Timeout(format!("sub-router provider '{}' timed out", provider.id)))?
            .map_err(|e| Error::Transient(format!("sub-router provider '{}' unreachable: {e}", provider.id)))?;

        if response.status().is_server_error() {
            return Err(Error::Transient(format!(
                "sub-router provider '{}' returned {}",
                provider.id,
                response.status()
            )));
        }
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "sub-router provider '{}' returned {}",
                provider.id,
                response.status()
            )));
        }

        let parsed: SubRouteResponse = response
            .json()
            .await
            .map_err(|e| Error::Http(format!("sub-router provider '{}' returned unparsable body: {e}", provider.id)))?;

        Ok(parsed.chosen_agents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_router_reports_not_configured() {
        let client = AiRouterClient::new(Vec::new(), 30);
        assert!(!client.is_configured());
    }
}
