//! Process adapter — wraps a CLI backend (`claude`, `codex`, `gemini`, or
//! a custom `adapters.json` entry) as an [`Adapter`].
//!
//! Spawns the configured command with stdio piped, strips sensitive env
//! vars before exec, and decodes stdout line-by-line as JSON-encoded
//! [`Chunk`] values — the wire contract an adapter backend must emit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentim_domain::chunk::Chunk;
use agentim_domain::error::{Error, Result};
use agentim_domain::room_context::RoomContextSnapshot;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::{Adapter, ChunkSender};
use crate::permission::PermissionHook;

/// Environment variables never forwarded to a spawned adapter process,
/// regardless of what the parent gateway process carries.
const SENSITIVE_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "SSH_AUTH_SOCK",
    "SSH_AGENT_PID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AGENTIM_AUTH_SECRET",
    "AGENTIM_REVOCATION_SECRET",
];

/// How the turn's prompt text reaches the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVia {
    Arg,
    Stdin,
}

#[derive(Debug, Clone)]
pub struct ProcessAdapterConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub prompt_via: PromptVia,
    pub working_directory: Option<String>,
    pub max_buffer_bytes: usize,
    pub turn_timeout: Duration,
}

pub struct ProcessAdapter {
    config: ProcessAdapterConfig,
    running: AtomicBool,
    kill_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl ProcessAdapter {
    pub fn new(config: ProcessAdapterConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
            kill_tx: Mutex::new(None),
        }
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args);
        if self.config.prompt_via == PromptVia::Arg {
            cmd.arg(prompt);
        }
        if let Some(wd) = &self.config.working_directory {
            cmd.current_dir(wd);
        }
        cmd.env_clear();
        for (k, v) in std::env::vars() {
            if !SENSITIVE_ENV_VARS.contains(&k.as_str()) {
                cmd.env(k, v);
            }
        }
        for (k, v) in &self.config.env {
            cmd.env(k, v);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd
    }
}

#[async_trait]
impl Adapter for ProcessAdapter {
    async fn send_message(
        &self,
        content: String,
        _context: RoomContextSnapshot,
        chunks: ChunkSender,
        permissions: PermissionHook,
    ) -> Result<String> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(Error::AdapterFailure("Agent is already processing a message".into()));
        }
        struct RunningGuard<'a>(&'a AtomicBool);
        impl Drop for RunningGuard<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _guard = RunningGuard(&self.running);

        let mut cmd = self.build_command(&content);
        let mut child = cmd.spawn().map_err(map_spawn_error)?;

        // Stdin stays open for the whole turn, not just the initial
        // prompt write: a child that asks for tool permission via a
        // `permission_request` stdout line gets its answer written back
        // here as a `permission_response` line.
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(8);
        if let Some(mut stdin) = child.stdin.take() {
            tokio::spawn(async move {
                while let Some(line) = stdin_rx.recv().await {
                    if stdin.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    if stdin.write_all(b"\n").await.is_err() {
                        break;
                    }
                    let _ = stdin.flush().await;
                }
            });
        }
        if self.config.prompt_via == PromptVia::Stdin {
            let _ = stdin_tx.send(content.clone()).await;
        }

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take();

        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);
        *self.kill_tx.lock() = Some(kill_tx);

        let overflow_reason: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let kill_on_overflow = self.kill_tx.lock().clone().expect("just set");
        let overflow_reason2 = overflow_reason.clone();
        let max_buffer = self.config.max_buffer_bytes;

        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut total = 0usize;
            let mut full = String::new();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        total += line.len();
                        if total > max_buffer {
                            *overflow_reason2.lock() = Some("Response too large".into());
                            let _ = kill_on_overflow.send(()).await;
                            return full;
                        }
                        if let Some(request) = parse_permission_request(&line) {
                            let permissions = permissions.clone();
                            let stdin_tx = stdin_tx.clone();
                            tokio::spawn(async move {
                                let decision = permissions.ask(request.tool_name, request.tool_input).await;
                                let response = serde_json::json!({
                                    "variant": "permission_response",
                                    "requestId": request.request_id,
                                    "approved": decision == crate::permission::PermissionDecision::Allow,
                                });
                                let _ = stdin_tx.send(response.to_string()).await;
                            });
                            continue;
                        }
                        if let Ok(chunk) = serde_json::from_str::<Chunk>(&line) {
                            if let Chunk::Text { content } = &chunk {
                                full.push_str(content);
                            }
                            let _ = chunks.send(chunk).await;
                        } else {
                            tracing::debug!(line = %line, "adapter emitted non-chunk stdout line, ignoring");
                        }
                    }
                    Ok(None) => return full,
                    Err(_) => return full,
                }
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(line = %line, "adapter stderr");
                }
            });
        }

        let timeout = self.config.turn_timeout;
        tokio::select! {
            status = child.wait() => {
                let full_content = reader_task.await.unwrap_or_default();
                *self.kill_tx.lock() = None;
                match status {
                    Ok(s) if s.success() => Ok(full_content),
                    Ok(s) => {
                        if let Some(reason) = overflow_reason.lock().take() {
                            return Err(Error::AdapterFailure(reason));
                        }
                        Err(Error::AdapterFailure(exit_message(&s)))
                    }
                    Err(e) => Err(Error::Io(e)),
                }
            }
            _ = kill_rx.recv() => {
                let _ = child.kill().await;
                reader_task.abort();
                *self.kill_tx.lock() = None;
                let reason = overflow_reason.lock().take().unwrap_or_else(|| "stopped".into());
                Err(Error::AdapterFailure(reason))
            }
            _ = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                reader_task.abort();
                *self.kill_tx.lock() = None;
                Err(Error::Timeout("Process timed out".into()))
            }
        }
    }

    async fn stop(&self) {
        if let Some(tx) = self.kill_tx.lock().clone() {
            let _ = tx.send(()).await;
        }
    }

    async fn dispose(&self) {
        self.stop().await;
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct PermissionRequestLine {
    request_id: String,
    tool_name: String,
    tool_input: serde_json::Value,
}

/// A child's stdout line is a permission request, not a chunk, when it's
/// JSON shaped as `{"variant":"permission_request", "requestId", "toolName", "toolInput"}`.
fn parse_permission_request(line: &str) -> Option<PermissionRequestLine> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    if value.get("variant")?.as_str()? != "permission_request" {
        return None;
    }
    Some(PermissionRequestLine {
        request_id: value.get("requestId")?.as_str()?.to_string(),
        tool_name: value.get("toolName")?.as_str()?.to_string(),
        tool_input: value.get("toolInput").cloned().unwrap_or(serde_json::Value::Null),
    })
}

fn map_spawn_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::AdapterFailure("adapter binary not found — install it and ensure it's on PATH".into())
    } else {
        Error::Io(e)
    }
}

#[cfg(unix)]
fn exit_message(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    if let Some(sig) = status.signal() {
        format!("Process killed by signal {sig}")
    } else {
        format!("Process exited with code {}", status.code().unwrap_or(-1))
    }
}

#[cfg(not(unix))]
fn exit_message(status: &std::process::ExitStatus) -> String {
    format!("Process exited with code {}", status.code().unwrap_or(-1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentim_domain::room::Member;
    use chrono::Utc;

    fn context() -> RoomContextSnapshot {
        RoomContextSnapshot {
            room_id: "r1".into(),
            room_name: "room".into(),
            system_prompt: None,
            members: Vec::<Member>::new(),
            recent_messages: None,
            generated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_binary_gives_friendly_error() {
        let adapter = ProcessAdapter::new(ProcessAdapterConfig {
            command: "definitely-not-a-real-binary-xyz".into(),
            args: vec![],
            env: HashMap::new(),
            prompt_via: PromptVia::Arg,
            working_directory: None,
            max_buffer_bytes: 1024,
            turn_timeout: Duration::from_secs(5),
        });
        let (tx, _rx) = mpsc::channel(8);
        let err = adapter.send_message("hi".into(), context(), tx, crate::permission::PermissionHook::noop_allow()).await.unwrap_err();
        assert!(matches!(err, Error::AdapterFailure(_)));
    }

    #[tokio::test]
    async fn decodes_chunk_lines_from_echo() {
        let adapter = ProcessAdapter::new(ProcessAdapterConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"echo '{"variant":"text","content":"hello"}'"#.into(),
            ],
            env: HashMap::new(),
            prompt_via: PromptVia::Arg,
            working_directory: None,
            max_buffer_bytes: 1024,
            turn_timeout: Duration::from_secs(5),
        });
        let (tx, mut rx) = mpsc::channel(8);
        let full = adapter.send_message("ignored".into(), context(), tx, crate::permission::PermissionHook::noop_allow()).await.unwrap();
        assert_eq!(full, "hello");
        let chunk = rx.recv().await.unwrap();
        assert!(matches!(chunk, Chunk::Text { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let adapter = ProcessAdapter::new(ProcessAdapterConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "exit 3".into()],
            env: HashMap::new(),
            prompt_via: PromptVia::Arg,
            working_directory: None,
            max_buffer_bytes: 1024,
            turn_timeout: Duration::from_secs(5),
        });
        let (tx, _rx) = mpsc::channel(8);
        let err = adapter.send_message("hi".into(), context(), tx, crate::permission::PermissionHook::noop_allow()).await.unwrap_err();
        match err {
            Error::AdapterFailure(msg) => assert!(msg.contains("code 3")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
