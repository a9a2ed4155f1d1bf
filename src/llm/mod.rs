//! LLM Client Layer - chat-completions integration with streaming and tools
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction, plus a scripted mock
//! - OpenAiClient for any chat-completions compatible endpoint
//! - Streaming support
//! - The sandboxed tool set the model can call

pub mod client;
pub mod openai;
pub mod streaming;
pub mod tools;
pub mod types;

pub use client::{LlmClient, LlmError, MockLlmClient};
pub use openai::{OpenAiClient, OpenAiConfig};
pub use streaming::{DeltaAccumulator, StreamChunk, StreamHandle, create_stream_channel, parse_sse_event};
pub use tools::{Tool, ToolContext, ToolError, ToolKind, ToolRegistry, ToolResult};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, ToolDefinition, Usage};
