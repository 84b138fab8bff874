//! Outbound WebSocket client that connects this gateway process to the
//! broker's `/ws/gateway` endpoint: auth handshake, writer task, reader
//! loop dispatching inbound frames into the agent manager, and
//! reconnect-with-backoff on disconnect.

pub mod builder;
pub mod reconnect;

use std::sync::Arc;
use std::time::Duration;

use agentim_domain::agent::{AgentStatus, AgentType};
use agentim_domain::error::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use agentim_protocol::GatewayMessage;

use crate::agent_manager::{AgentManager, GatewaySink};
use crate::mcp_bridge::PendingReplyStore;
use crate::permission::{GatewayPermissionStore, PermissionDecision};
use crate::room_context::RoomContextCache;
use reconnect::ReconnectBackoff;

pub struct GatewayClient {
    pub(crate) server_url: String,
    pub(crate) token: String,
    pub(crate) gateway_id: String,
    pub(crate) version: String,
    pub(crate) auth_timeout: Duration,
    pub(crate) reconnect_backoff: ReconnectBackoff,
    pub(crate) agent_manager: Arc<AgentManager>,
    pub(crate) permissions: Arc<GatewayPermissionStore>,
    pub(crate) room_contexts: Arc<RoomContextCache>,
    pub(crate) pending_replies: Arc<PendingReplyStore>,
    pub(crate) outbound_slot: Arc<Mutex<Option<GatewaySink>>>,
}

impl GatewayClient {
    pub fn builder(server_url: impl Into<String>, token: impl Into<String>, gateway_id: impl Into<String>) -> builder::GatewayClientBuilder {
        builder::GatewayClientBuilder::new(server_url, token, gateway_id)
    }

    pub fn agent_manager(&self) -> Arc<AgentManager> {
        self.agent_manager.clone()
    }

    pub fn permissions(&self) -> Arc<GatewayPermissionStore> {
        self.permissions.clone()
    }

    pub fn room_contexts(&self) -> Arc<RoomContextCache> {
        self.room_contexts.clone()
    }

    pub fn pending_replies(&self) -> Arc<PendingReplyStore> {
        self.pending_replies.clone()
    }

    pub fn outbound_slot(&self) -> Arc<Mutex<Option<GatewaySink>>> {
        self.outbound_slot.clone()
    }

    /// Connect and run until `shutdown` is cancelled, reconnecting with
    /// backoff across transient disconnects.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut attempt: u32 = 0;

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let result = tokio::select! {
                r = self.connect_and_run(&shutdown) => r,
                _ = shutdown.cancelled() => {
                    tracing::info!(gateway_id = %self.gateway_id, "shutdown requested");
                    return Ok(());
                }
            };

            *self.outbound_slot.lock() = None;

            match result {
                Ok(handshake_completed) => {
                    tracing::info!(gateway_id = %self.gateway_id, handshake_completed, "connection to broker closed");
                    if handshake_completed {
                        attempt = 0;
                    }
                }
                Err(e) => {
                    tracing::warn!(gateway_id = %self.gateway_id, attempt, error = %e, "connection to broker lost");
                }
            }

            if self.reconnect_backoff.should_give_up(attempt) {
                tracing::error!(gateway_id = %self.gateway_id, attempts = attempt, "max reconnect attempts exhausted");
                return Err(Error::Transient(format!("gave up reconnecting after {attempt} attempts")));
            }

            let delay = self.reconnect_backoff.delay_for_attempt(attempt);
            tracing::info!(gateway_id = %self.gateway_id, delay_ms = delay.as_millis() as u64, attempt = attempt + 1, "reconnecting to broker");

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Ok(()),
            }

            attempt += 1;
        }
    }

    /// Single connection lifecycle. Returns `Ok(true)` if the auth
    /// handshake completed before the socket closed, `Ok(false)`
    /// otherwise.
    async fn connect_and_run(&self, shutdown: &CancellationToken) -> Result<bool> {
        tracing::info!(url = %self.server_url, gateway_id = %self.gateway_id, "connecting to broker");
        let (ws, _response) = tokio_tungstenite::connect_async(&self.server_url)
            .await
            .map_err(|e| Error::Transient(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let hello = GatewayMessage::Auth {
            token: self.token.clone(),
            gateway_id: self.gateway_id.clone(),
            version: self.version.clone(),
        };
        send(&mut sink, &hello).await?;

        let auth_result = tokio::time::timeout(self.auth_timeout, async {
            while let Some(Ok(msg)) = stream.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(GatewayMessage::AuthResult { ok, error }) = serde_json::from_str::<GatewayMessage>(&text) {
                        return Some((ok, error));
                    }
                }
            }
            None
        })
        .await
        .map_err(|_| Error::Timeout("gateway_auth_result timeout".into()))?;

        match auth_result {
            Some((true, _)) => {}
            Some((false, error)) => return Err(Error::Auth(error.unwrap_or_else(|| "authentication rejected".into()))),
            None => return Ok(false),
        }
        tracing::info!(gateway_id = %self.gateway_id, "broker accepted gateway_auth");

        let ws = sink
            .reunite(stream)
            .map_err(|e| Error::Other(format!("failed to reunite websocket halves: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<GatewayMessage>(128);
        *self.outbound_slot.lock() = Some(outbound_tx.clone());

        let writer = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if send(&mut sink, &msg).await.is_err() {
                    break;
                }
            }
        });

        loop {
            tokio::select! {
                next = stream.next() => {
                    match next {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<GatewayMessage>(&text) {
                                Ok(frame) => self.handle_inbound(frame, &outbound_tx).await,
                                Err(e) => tracing::debug!(error = %e, "ignoring unparseable broker frame"),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "websocket read error");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        writer.abort();
        Ok(true)
    }

    async fn handle_inbound(&self, msg: GatewayMessage, outbound: &GatewaySink) {
        match msg {
            GatewayMessage::SendToAgent {
                agent_id,
                room_id,
                message_id,
                sender_name,
                conversation_id,
                depth: _,
                content,
                context,
            } => {
                if let Some(conv) = &conversation_id {
                    if self.pending_replies.resolve(&agent_id, conv, content.clone()) {
                        return;
                    }
                }
                self.agent_manager.dispatch(&agent_id, room_id, message_id, content, sender_name, context, conversation_id, outbound.clone());
            }
            GatewayMessage::StopAgent { agent_id } => self.agent_manager.stop_agent(&agent_id),
            GatewayMessage::RemoveAgent { agent_id } => self.agent_manager.remove_agent(&agent_id),
            GatewayMessage::RoomContext { agent_id, context } => {
                self.room_contexts.store(&agent_id, &context.room_id, context);
            }
            GatewayMessage::SpawnAgent { agent_type, name, working_directory } => {
                self.handle_spawn_agent(agent_type, name, working_directory, outbound).await;
            }
            GatewayMessage::QueryAgentInfo { agent_id } => {
                // No dedicated wire reply exists for ad-hoc info queries;
                // re-announcing status is the closest honest answer.
                if self.agent_manager.agent_ids().contains(&agent_id) {
                    let _ = outbound
                        .send(GatewayMessage::AgentStatus {
                            agent_id,
                            status: AgentStatus::Online,
                            queue_depth: 0,
                        })
                        .await;
                }
            }
            GatewayMessage::RequestWorkspace { agent_id, request_id } => {
                self.handle_request_workspace(agent_id, request_id, outbound).await;
            }
            GatewayMessage::ServerPermissionResponse { permission_id, approved, reason: _ } => {
                self.permissions.resolve(&permission_id, if approved { PermissionDecision::Allow } else { PermissionDecision::Deny });
            }
            GatewayMessage::AgentCommand { agent_id, command, args } => {
                self.handle_agent_command(agent_id, command, args).await;
            }
            other => {
                tracing::debug!(?other, "ignoring broker frame with no gateway-side handling");
            }
        }
    }

    async fn handle_spawn_agent(&self, agent_type: String, name: String, working_directory: Option<String>, outbound: &GatewaySink) {
        let agent_type: AgentType = agent_type.parse().expect("AgentType::from_str is infallible");

        let owner_user_id = crate::persisted::GatewayConfig::load(&crate::persisted::agentim_home().join("config.json"))
            .user_id
            .unwrap_or_else(|| "unknown".to_string());

        match self.agent_manager.spawn_agent(owner_user_id, self.gateway_id.clone(), name, agent_type, working_directory) {
            Ok(agent) => {
                let agent_id = agent.id.clone();
                let _ = outbound.send(GatewayMessage::RegisterAgent { agent }).await;
                let _ = outbound.send(GatewayMessage::SpawnResult { agent_id, ok: true, error: None }).await;
            }
            Err(e) => {
                let _ = outbound
                    .send(GatewayMessage::SpawnResult {
                        agent_id: String::new(),
                        ok: false,
                        error: Some(e.to_string()),
                    })
                    .await;
            }
        }
    }

    async fn handle_agent_command(&self, agent_id: String, command: String, args: serde_json::Value) {
        let Some(adapter) = self.agent_manager.adapter_for(&agent_id) else {
            tracing::debug!(agent_id, command, "agent command for unknown agent, dropping");
            return;
        };
        let args_str = args.as_str().map(str::to_string).unwrap_or_else(|| args.to_string());
        let result = adapter.handle_slash_command(&command, &args_str).await;
        tracing::debug!(agent_id, command, success = result.success, "agent command handled");
    }

    async fn handle_request_workspace(&self, agent_id: String, request_id: String, outbound: &GatewaySink) {
        let Some(working_directory) = self.agent_manager.working_directory_of(&agent_id) else {
            let _ = outbound
                .send(GatewayMessage::WorkspaceResponse {
                    agent_id,
                    request_id,
                    data: serde_json::json!({"error": "agent has no working directory"}),
                })
                .await;
            return;
        };

        let probe = crate::workspace::probe(&working_directory, Duration::from_secs(15)).await;
        let data = serde_json::to_value(&probe).unwrap_or(serde_json::Value::Null);
        let _ = outbound.send(GatewayMessage::WorkspaceResponse { agent_id, request_id, data }).await;
    }
}

async fn send(sink: &mut (impl SinkExt<Message> + Unpin), msg: &GatewayMessage) -> Result<()> {
    let json = serde_json::to_string(msg).map_err(Error::Json)?;
    sink.send(Message::Text(json)).await.map_err(|e| Error::Transient(e.to_string()))
}
