use std::sync::Arc;

use agentim_domain::config::Config;

use crate::auth::TokenVerifier;
use crate::hub::registry::{AgentRegistry, ClientRegistry, GatewayRegistry};
use crate::permission::PermissionStore;
use crate::rooms::RoomStore;
use crate::routing::ai_router::AiRouterClient;
use crate::routing::chain::ChainStore;
use crate::routing::rate_limit::AgentRateLimiter;
use crate::security::revocation::RevocationStore;
use crate::settings::SettingsRegistry;

/// Shared application state passed to every HTTP/WS handler.
///
/// Fields are grouped by concern:
/// - **Core** — config
/// - **Hub** — client/gateway/agent registries (who's connected)
/// - **Routing** — chain safety, rate limiting, AI sub-router
/// - **Security** — auth verification, token revocation, SSRF is stateless
/// - **Coordination** — pending permission requests, room cache, settings
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,

    // ── Hub ───────────────────────────────────────────────────────────
    pub clients: Arc<ClientRegistry>,
    pub gateways: Arc<GatewayRegistry>,
    pub agents: Arc<AgentRegistry>,

    // ── Routing ───────────────────────────────────────────────────────
    pub chains: Arc<ChainStore>,
    pub rate_limiter: Arc<AgentRateLimiter>,
    pub ai_router: Arc<AiRouterClient>,

    // ── Security ──────────────────────────────────────────────────────
    pub auth: Arc<dyn TokenVerifier>,
    pub revocations: Arc<RevocationStore>,

    // ── Coordination ──────────────────────────────────────────────────
    pub permissions: Arc<PermissionStore>,
    pub rooms: Arc<RoomStore>,
    pub settings: Arc<SettingsRegistry>,
}
