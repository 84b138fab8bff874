//! SDK adapter — wraps a vendor SDK's streaming client instead of a
//! spawned CLI process.
//!
//! The vendor SDK itself is an out-of-scope external collaborator (§"Out
//! of scope"): this module only defines the [`SdkBackend`] contract a
//! concrete vendor integration must satisfy, plus the session-resumption
//! and event-to-chunk mapping logic that sits in front of it. Mirrors
//! the dependency-free default pattern used for the settings/room
//! backends — a real deployment supplies its own `SdkBackend`.

use agentim_domain::chunk::Chunk;
use agentim_domain::error::{Error, Result};
use agentim_domain::room_context::RoomContextSnapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{Adapter, ChunkSender};
use crate::permission::PermissionHook;

/// One event from the vendor SDK's streaming iterator. `session_id` is
/// only ever carried on `Init`, the first event of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SdkEvent {
    Init { session_id: String },
    Assistant { text: String },
    StreamEvent { thinking: String },
    ToolUse { name: String, input_summary: String, id: String },
    ToolResult { id: String, content: String },
    Result { full_text: String },
    Error { message: String },
}

/// The vendor SDK integration seam. A concrete implementation owns the
/// actual client and turns it into this iterator-shaped async contract.
#[async_trait]
pub trait SdkBackend: Send + Sync {
    /// Start (or resume, if `session_id` is `Some`) a turn, streaming
    /// events on `events` until the turn ends. `permissions` is the hook
    /// to call before acting on any tool the SDK wants to use.
    async fn run_turn(
        &self,
        prompt: String,
        session_id: Option<String>,
        events: mpsc::Sender<SdkEvent>,
        permissions: PermissionHook,
    ) -> Result<()>;

    /// Best-effort interrupt of whatever turn is in flight.
    async fn interrupt(&self);
}

/// Stand-in used until a real vendor SDK is wired in; always fails so a
/// misconfigured `agent_type: sdk` agent errors loudly instead of
/// silently hanging.
pub struct NullSdkBackend;

#[async_trait]
impl SdkBackend for NullSdkBackend {
    async fn run_turn(&self, _prompt: String, _session_id: Option<String>, _events: mpsc::Sender<SdkEvent>, _permissions: PermissionHook) -> Result<()> {
        Err(Error::Config("no SdkBackend configured for this agent type".into()))
    }

    async fn interrupt(&self) {}
}

pub struct SdkAdapter {
    backend: Box<dyn SdkBackend>,
    session_id: Mutex<Option<String>>,
    running: std::sync::atomic::AtomicBool,
}

impl SdkAdapter {
    pub fn new(backend: Box<dyn SdkBackend>) -> Self {
        Self {
            backend,
            session_id: Mutex::new(None),
            running: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// The session id captured from the SDK's `Init` event, if a turn
    /// has run at least once. Gateways persist this for resume-on-restart.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn restore_session(&self, session_id: String) {
        *self.session_id.lock() = Some(session_id);
    }
}

#[async_trait]
impl Adapter for SdkAdapter {
    async fn send_message(
        &self,
        content: String,
        _context: RoomContextSnapshot,
        chunks: ChunkSender,
        permissions: PermissionHook,
    ) -> Result<String> {
        use std::sync::atomic::Ordering;
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AdapterFailure("Agent is already processing a message".into()));
        }
        struct RunningGuard<'a>(&'a std::sync::atomic::AtomicBool);
        impl Drop for RunningGuard<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _guard = RunningGuard(&self.running);

        let resume_id = self.session_id.lock().clone();
        let (tx, mut rx) = mpsc::channel(64);
        let run = self.backend.run_turn(content, resume_id, tx, permissions);

        let mut full_content = String::new();
        let mut turn_error: Option<String> = None;

        let drain = async {
            while let Some(event) = rx.recv().await {
                match event {
                    SdkEvent::Init { session_id } => {
                        *self.session_id.lock() = Some(session_id);
                    }
                    SdkEvent::Assistant { text } => {
                        full_content.push_str(&text);
                        let _ = chunks.send(Chunk::Text { content: text }).await;
                    }
                    SdkEvent::StreamEvent { thinking } => {
                        let _ = chunks.send(Chunk::Thinking { content: thinking }).await;
                    }
                    SdkEvent::ToolUse { name, input_summary, id } => {
                        let _ = chunks
                            .send(Chunk::ToolUse {
                                content: input_summary,
                                tool_name: Some(name),
                                tool_id: Some(id),
                            })
                            .await;
                    }
                    SdkEvent::ToolResult { id, content } => {
                        let _ = chunks
                            .send(Chunk::ToolResult {
                                content,
                                tool_id: Some(id),
                            })
                            .await;
                    }
                    // `result`/end-of-turn markers are internal bookkeeping
                    // from the SDK's iterator, not re-emitted as chunks —
                    // re-emitting would double the text already streamed
                    // via `Assistant` events.
                    SdkEvent::Result { full_text } => {
                        if full_content.is_empty() {
                            full_content = full_text;
                        }
                    }
                    SdkEvent::Error { message } => {
                        turn_error = Some(message);
                    }
                }
            }
        };

        let (run_result, ()) = tokio::join!(run, drain);
        run_result?;

        match turn_error {
            Some(msg) => Err(Error::AdapterFailure(msg)),
            None => Ok(full_content),
        }
    }

    async fn stop(&self) {
        self.backend.interrupt().await;
    }

    async fn dispose(&self) {
        self.backend.interrupt().await;
    }

    fn is_running(&self) -> bool {
        self.running.load(std::sync::atomic::Ordering::SeqCst)
    }
}
