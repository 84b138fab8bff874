use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The streaming unit produced by an adapter.
///
/// `result`/`end-of-turn` markers emitted by underlying SDKs are internal
/// to the adapter and MUST NOT be represented here — re-emitting them
/// would double the final text in `onComplete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Chunk {
    Text {
        content: String,
    },
    Thinking {
        content: String,
    },
    ToolUse {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_id: Option<String>,
    },
    ToolResult {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_id: Option<String>,
    },
    Error {
        content: String,
    },
    WorkspaceStatus {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
}

impl Chunk {
    pub fn content(&self) -> &str {
        match self {
            Chunk::Text { content }
            | Chunk::Thinking { content }
            | Chunk::ToolUse { content, .. }
            | Chunk::ToolResult { content, .. }
            | Chunk::Error { content }
            | Chunk::WorkspaceStatus { content, .. } => content,
        }
    }

    pub fn metadata(&self) -> HashMap<String, String> {
        let mut meta = HashMap::new();
        match self {
            Chunk::ToolUse {
                tool_name, tool_id, ..
            } => {
                if let Some(n) = tool_name {
                    meta.insert("toolName".to_string(), n.clone());
                }
                if let Some(i) = tool_id {
                    meta.insert("toolId".to_string(), i.clone());
                }
            }
            Chunk::ToolResult { tool_id, .. } => {
                if let Some(i) = tool_id {
                    meta.insert("toolId".to_string(), i.clone());
                }
            }
            Chunk::WorkspaceStatus {
                working_directory, ..
            } => {
                if let Some(wd) = working_directory {
                    meta.insert("workingDirectory".to_string(), wd.clone());
                }
            }
            _ => {}
        }
        meta
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Chunk::Text { .. })
    }
}

/// Incrementally folds a stream of chunks into the final `fullContent`
/// passed to `onComplete`: only `text` chunks are concatenated, in the
/// order the adapter emitted them.
#[derive(Debug, Default)]
pub struct ChunkAccumulator {
    full_content: String,
    chunks: Vec<Chunk>,
}

impl ChunkAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Chunk) {
        if let Chunk::Text { content } = &chunk {
            self.full_content.push_str(content);
        }
        self.chunks.push(chunk);
    }

    pub fn full_content(&self) -> &str {
        &self.full_content
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_concatenates_only_text() {
        let mut acc = ChunkAccumulator::new();
        acc.push(Chunk::Text {
            content: "Hello, ".into(),
        });
        acc.push(Chunk::Thinking {
            content: "pondering".into(),
        });
        acc.push(Chunk::Text {
            content: "world.".into(),
        });
        assert_eq!(acc.full_content(), "Hello, world.");
        assert_eq!(acc.chunks().len(), 3);
    }
}
