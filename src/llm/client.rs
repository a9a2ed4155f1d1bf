//! Core LLM client trait, errors and a scripted mock

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::streaming::StreamChunk;
use super::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call carries the full conversation
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Streaming completion. Text deltas go to `chunk_tx` as they arrive,
    /// followed by [`StreamChunk::Done`]; the assembled response is returned.
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError>;

    /// Model identifier used when the request does not name one
    fn model(&self) -> &str;
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("no response choices returned")]
    EmptyResponse,

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },

    #[error("Event source error: {0}")]
    EventSource(String),
}

/// Scripted client for tests and offline runs.
///
/// Responses are handed out in order. Once the script is exhausted the
/// fallback response (if any) is repeated, otherwise calls fail. Every
/// request is recorded.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Script that may include failures
    pub fn with_results(results: Vec<Result<CompletionResponse, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Default::default()
        }
    }

    /// Answer every call with `response`
    pub fn repeating(response: CompletionResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Default::default()
        }
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_response(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);

        let scripted = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match (scripted, &self.fallback) {
            (Some(result), _) => result,
            (None, Some(fallback)) => Ok(fallback.clone()),
            (None, None) => Err(LlmError::InvalidResponse("mock script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.next_response(request)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let response = self.next_response(request)?;
        for piece in response.content.split_inclusive(' ') {
            let _ = chunk_tx.send(StreamChunk::Text(piece.to_string())).await;
        }
        for call in &response.tool_calls {
            let _ = chunk_tx
                .send(StreamChunk::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                })
                .await;
        }
        let _ = chunk_tx.send(StreamChunk::Done).await;
        Ok(response)
    }

    fn model(&self) -> &str {
        "mock"
    }
}
