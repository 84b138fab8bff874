//! The polymorphic producer every agent backend implements: a process
//! wrapping a CLI (`process.rs`) or a vendor SDK's streaming client
//! (`sdk.rs`). The Agent Manager only ever talks to this trait.

pub mod process;
pub mod registry;
pub mod sdk;

use agentim_domain::chunk::Chunk;
use agentim_domain::error::Result;
use agentim_domain::room_context::RoomContextSnapshot;
use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::permission::PermissionHook;

pub type ChunkSender = mpsc::Sender<Chunk>;

#[derive(Debug, Clone, Serialize)]
pub struct SlashCommand {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub source: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlashCommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CostSummary {
    pub usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
}

/// A single agent backend. At most one in-flight `send_message` per
/// instance — the Agent Manager enforces this by checking `is_running`
/// before dispatch, never by racing two calls against the same adapter.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Run one turn. Chunks are streamed on `chunks` as they're produced;
    /// the returned string is the concatenated `fullContent` the caller
    /// passes to `message_complete`. An `Err` is surfaced as an inline
    /// error chunk by the caller, not by this method.
    async fn send_message(
        &self,
        content: String,
        context: RoomContextSnapshot,
        chunks: ChunkSender,
        permissions: PermissionHook,
    ) -> Result<String>;

    /// Best-effort interruption of the current turn, if any.
    async fn stop(&self);

    /// Release all resources. Idempotent.
    async fn dispose(&self);

    fn slash_commands(&self) -> Vec<SlashCommand> {
        Vec::new()
    }

    async fn handle_slash_command(&self, _cmd: &str, _args: &str) -> SlashCommandResult {
        SlashCommandResult {
            success: false,
            message: Some("no slash commands registered".into()),
        }
    }

    fn mcp_servers(&self) -> Vec<String> {
        Vec::new()
    }

    fn model(&self) -> Option<String> {
        None
    }

    fn thinking_mode(&self) -> Option<String> {
        None
    }

    fn effort_level(&self) -> Option<String> {
        None
    }

    fn cost_summary(&self) -> CostSummary {
        CostSummary::default()
    }

    fn is_running(&self) -> bool;
}
