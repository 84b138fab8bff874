//! AppState construction extracted from `main.rs`, so tests and
//! alternate entry points can boot the full broker runtime without an
//! HTTP listener.

use std::sync::Arc;

use agentim_domain::config::{Config, ConfigSeverity};
use anyhow::Context;

use crate::auth::SharedSecretVerifier;
use crate::hub::registry::{AgentRegistry, ClientRegistry, GatewayRegistry};
use crate::permission::PermissionStore;
use crate::rooms::{NullRoomBackend, RoomStore};
use crate::routing::ai_router::AiRouterClient;
use crate::routing::chain::ChainStore;
use crate::routing::rate_limit::AgentRateLimiter;
use crate::security::revocation::RevocationStore;
use crate::settings::{default_settings, NullSettingsBackend, SettingsRegistry};
use crate::state::AppState;

/// Validate config and wire every subsystem into a fully-built
/// [`AppState`]. The shared "boot" path used by `serve` and by tests.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    // ── Hub registries ───────────────────────────────────────────────
    let clients = Arc::new(ClientRegistry::new());
    let gateways = Arc::new(GatewayRegistry::new());
    let agents = Arc::new(AgentRegistry::new());
    tracing::info!("hub registries ready");

    // ── Routing ──────────────────────────────────────────────────────
    let chains = Arc::new(ChainStore::new(config.routing.max_chain_depth, config.routing.chain_ttl_secs));
    let rate_limiter = Arc::new(AgentRateLimiter::new(60, config.routing.max_messages_per_minute_per_agent));
    let ai_router = Arc::new(AiRouterClient::new(
        config.ai_router.providers.clone(),
        config.ai_router.request_timeout_secs,
    ));
    tracing::info!(
        sub_providers = config.ai_router.providers.len(),
        "routing engine ready"
    );

    // ── Security ─────────────────────────────────────────────────────
    let auth_secret = std::env::var("AGENTIM_AUTH_SECRET")
        .context("AGENTIM_AUTH_SECRET must be set (shared secret for client/gateway token verification)")?
        .into_bytes();
    let auth = Arc::new(SharedSecretVerifier::new(auth_secret));

    let revocation_secret = std::env::var("AGENTIM_REVOCATION_SECRET")
        .unwrap_or_else(|_| "agentim-dev-revocation-secret".to_string())
        .into_bytes();
    let revocations = Arc::new(RevocationStore::new(config.revocation.cache_capacity, revocation_secret));
    tracing::info!("security subsystems ready");

    // ── Coordination ─────────────────────────────────────────────────
    let permissions = Arc::new(PermissionStore::new(
        config.permission.timeout_secs,
        config.permission.reminder_fraction,
    ));
    let rooms = Arc::new(RoomStore::new(Box::new(NullRoomBackend)));
    let settings = Arc::new(SettingsRegistry::new(
        default_settings(),
        Box::new(NullSettingsBackend),
        config.settings.cache_ttl_secs,
    ));
    tracing::info!("coordination subsystems ready");

    Ok(AppState {
        config,
        clients,
        gateways,
        agents,
        chains,
        rate_limiter,
        ai_router,
        auth,
        revocations,
        permissions,
        rooms,
        settings,
    })
}

/// Spawn the periodic sweeps the hub depends on: expired conversation
/// chains, stale gateway connections, and the revocation DB-fallback
/// poll. Returns the join handles so `main` can track/abort them.
pub fn spawn_background_tasks(state: &AppState) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    let chains = state.chains.clone();
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = chains.sweep_expired();
            if removed > 0 {
                tracing::debug!(removed, "swept expired conversation chains");
            }
        }
    }));

    let gateways = state.gateways.clone();
    let heartbeat_timeout = state.config.websocket.heartbeat_timeout_secs as i64;
    handles.push(tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            gateways.prune_stale(heartbeat_timeout);
        }
    }));

    handles
}
