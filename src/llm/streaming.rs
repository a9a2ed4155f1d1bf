//! Streaming support for LLM responses.
//!
//! Chat-completions streams arrive as Server-Sent Events whose `data:` lines
//! carry [`ChatChunk`] JSON objects, terminated by `data: [DONE]`. Text deltas
//! are forwarded to the consumer as they arrive; tool-call fragments are keyed
//! by index and merged until the stream ends.

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio::sync::mpsc;

use super::client::LlmError;
use super::types::{CompletionResponse, StopReason, ToolCall, Usage};

/// One streamed chunk of a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<ChunkUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call; `index` ties fragments of the same call together
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Chunk types emitted to consumers during streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Tool call started
    ToolCall {
        /// Unique tool call ID
        id: String,
        /// Name of the tool being called
        name: String,
    },
    /// Stream completed successfully
    Done,
    /// Stream error
    Error(String),
}

/// Handle for receiving streaming chunks.
pub struct StreamHandle {
    /// Receiver for stream chunks
    pub receiver: mpsc::Receiver<StreamChunk>,
}

impl StreamHandle {
    /// Create a new stream handle with the given receiver.
    pub fn new(receiver: mpsc::Receiver<StreamChunk>) -> Self {
        Self { receiver }
    }

    /// Receive the next chunk from the stream.
    pub async fn recv(&mut self) -> Option<StreamChunk> {
        self.receiver.recv().await
    }

    /// Collect all text up to the next `Done` or `Error`.
    pub async fn collect_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(chunk) = self.recv().await {
            match chunk {
                StreamChunk::Text(t) => text.push_str(&t),
                StreamChunk::Done | StreamChunk::Error(_) => break,
                StreamChunk::ToolCall { .. } => {}
            }
        }
        text
    }
}

/// Builder for stream handle pairs (sender and handle).
pub fn create_stream_channel(buffer_size: usize) -> (mpsc::Sender<StreamChunk>, StreamHandle) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (tx, StreamHandle::new(rx))
}

/// Parse the `data:` payload of one SSE event.
///
/// Returns `None` for blank payloads, the `[DONE]` sentinel and anything that
/// is not a chunk object.
pub fn parse_sse_event(data: &str) -> Option<ChatChunk> {
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    serde_json::from_str(data).ok()
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merges streamed deltas into a complete [`CompletionResponse`].
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    content: String,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    finish_reason: Option<String>,
    usage: Usage,
    saw_choice: bool,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in and return the chunks to forward to the consumer.
    pub fn apply(&mut self, chunk: ChatChunk) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        if let Some(usage) = chunk.usage {
            self.usage = Usage::new(usage.prompt_tokens, usage.completion_tokens);
        }

        for choice in chunk.choices {
            self.saw_choice = true;
            if let Some(text) = choice.delta.content
                && !text.is_empty()
            {
                self.content.push_str(&text);
                out.push(StreamChunk::Text(text));
            }

            for delta in choice.delta.tool_calls.into_iter().flatten() {
                let entry = self.tool_calls.entry(delta.index).or_default();
                let was_named = !entry.name.is_empty();
                if let Some(id) = delta.id
                    && !id.is_empty()
                {
                    entry.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
                if !was_named && !entry.name.is_empty() {
                    out.push(StreamChunk::ToolCall {
                        id: entry.id.clone(),
                        name: entry.name.clone(),
                    });
                }
            }

            if choice.finish_reason.is_some() {
                self.finish_reason = choice.finish_reason;
            }
        }

        out
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Finish the stream. Tool calls come back in index order.
    pub fn finish(self) -> Result<CompletionResponse, LlmError> {
        if !self.saw_choice {
            return Err(LlmError::EmptyResponse);
        }

        let mut tool_calls = Vec::with_capacity(self.tool_calls.len());
        for (index, partial) in self.tool_calls {
            if partial.name.is_empty() {
                return Err(LlmError::InvalidResponse(format!(
                    "streamed tool call at index {} has no function name",
                    index
                )));
            }
            tool_calls.push(ToolCall::new(partial.id, partial.name, partial.arguments));
        }

        let stop_reason = if tool_calls.is_empty() {
            StopReason::from_finish_reason(self.finish_reason.as_deref())
        } else {
            StopReason::ToolUse
        };

        Ok(CompletionResponse {
            content: self.content,
            tool_calls,
            stop_reason,
            usage: self.usage,
        })
    }
}
