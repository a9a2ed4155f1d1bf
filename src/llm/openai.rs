//! OpenAI-compatible chat-completions client
//!
//! Works against any server exposing `POST {base_url}/chat/completions` with
//! bearer authentication.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use reqwest_eventsource::{Event, EventSource};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::client::{LlmClient, LlmError};
use super::streaming::{DeltaAccumulator, StreamChunk, parse_sse_event};
use super::types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, ToolCall, Usage};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for the OpenAI-compatible client
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl OpenAiConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Full URL of the completions endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Chat-completions client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a client, reading the API key from `config.api_key_env`
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: impl Into<String>, config: OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        info!("OpenAI client ready: model={} endpoint={}", config.model, config.endpoint());

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    /// Build the request body for the chat-completions API
    fn build_request(&self, request: &CompletionRequest, stream: bool) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request.tools.iter().map(|t| t.to_openai_schema()).collect();
            body["tools"] = json!(tools);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    /// Parse a non-streaming response body
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, LlmError> {
        let choices = body["choices"]
            .as_array()
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices array".to_string()))?;
        let choice = choices.first().ok_or(LlmError::EmptyResponse)?;
        let message = &choice["message"];

        let content = message["content"].as_str().unwrap_or_default().to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let id = call["id"].as_str().unwrap_or_default().to_string();
                let name = call["function"]["name"].as_str().unwrap_or_default().to_string();
                if name.is_empty() {
                    return Err(LlmError::InvalidResponse(format!("tool call {} has no function name", id)));
                }
                let arguments = match &call["function"]["arguments"] {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                tool_calls.push(ToolCall::new(id, name, arguments));
            }
        }

        let stop_reason = if tool_calls.is_empty() {
            StopReason::from_finish_reason(choice["finish_reason"].as_str())
        } else {
            StopReason::ToolUse
        };

        let usage = match body.get("usage") {
            Some(u) => Usage::new(
                u["prompt_tokens"].as_u64().unwrap_or(0),
                u["completion_tokens"].as_u64().unwrap_or(0),
            ),
            None => Usage::default(),
        };

        Ok(CompletionResponse {
            content,
            tool_calls,
            stop_reason,
            usage,
        })
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        self.client
            .post(self.config.endpoint())
            .bearer_auth(&self.api_key)
            .json(body)
    }

    /// Send a request to the API
    async fn send_request(&self, body: Value) -> Result<Value, LlmError> {
        let response = self.post(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Completion request failed: status={}", status);
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message: extract_error_message(&error_body),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request, false);
        debug!("complete: {} messages, {} tools", request.messages.len(), request.tools.len());
        let response = self.send_request(body).await?;
        self.parse_response(response)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let body = self.build_request(&request, true);
        debug!("stream: {} messages, {} tools", request.messages.len(), request.tools.len());

        let mut source = EventSource::new(self.post(&body)).map_err(|e| LlmError::EventSource(e.to_string()))?;
        let mut accumulator = DeltaAccumulator::new();

        let outcome = loop {
            match source.next().await {
                None => break Ok(()),
                Some(Ok(Event::Open)) => debug!("stream: connection open"),
                Some(Ok(Event::Message(message))) => {
                    if message.data.trim() == "[DONE]" {
                        break Ok(());
                    }
                    match parse_sse_event(&message.data) {
                        Some(chunk) => {
                            for out in accumulator.apply(chunk) {
                                let _ = chunk_tx.send(out).await;
                            }
                        }
                        None => debug!("stream: skipping unparseable event"),
                    }
                }
                Some(Err(reqwest_eventsource::Error::StreamEnded)) => break Ok(()),
                Some(Err(reqwest_eventsource::Error::InvalidStatusCode(status, response))) => {
                    let error_body = response.text().await.unwrap_or_default();
                    break Err(LlmError::ApiError {
                        status: status.as_u16(),
                        message: extract_error_message(&error_body),
                    });
                }
                Some(Err(e)) => break Err(LlmError::EventSource(e.to_string())),
            }
        };
        source.close();

        match outcome {
            Ok(()) => {
                let _ = chunk_tx.send(StreamChunk::Done).await;
                accumulator.finish()
            }
            Err(e) => {
                warn!("Stream failed: {}", e);
                let _ = chunk_tx.send(StreamChunk::Error(e.to_string())).await;
                Err(e)
            }
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

fn message_to_wire(message: &Message) -> Value {
    match message.role {
        Role::System => json!({ "role": "system", "content": message.content }),
        Role::User => json!({ "role": "user", "content": message.content }),
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id.as_deref().unwrap_or_default(),
            "content": message.content,
        }),
        Role::Assistant if message.tool_calls.is_empty() => {
            json!({ "role": "assistant", "content": message.content })
        }
        Role::Assistant => {
            let calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": { "name": call.name, "arguments": call.arguments },
                    })
                })
                .collect();
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            json!({ "role": "assistant", "content": content, "tool_calls": calls })
        }
    }
}

/// Pull `error.message` out of an API error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
