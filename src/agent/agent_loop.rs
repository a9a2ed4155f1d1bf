//! Agent loop - alternates model turns with sandboxed tool execution.
//!
//! One `run` appends the user's message, then repeatedly sends the whole
//! history to the model. A reply without tool calls is the final answer.
//! A reply with tool calls is recorded, each call is executed in the order
//! the model gave, one tool message per call is appended, and the next turn
//! starts. The number of model round-trips per run is capped.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::history::ConversationHistory;
use crate::error::{AgentError, Result};
use crate::llm::{
    CompletionRequest, CompletionResponse, LlmClient, Message, StreamChunk, ToolRegistry, Usage,
};

pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Configuration for the AgentLoop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model round-trips allowed per run; values below 1 become 1
    pub max_turns: u32,
    /// Maximum tokens for LLM responses
    pub max_tokens: Option<u32>,
    /// Overrides the client's default model
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            max_tokens: None,
            model: None,
        }
    }
}

/// Drives one conversation against the completion model
pub struct AgentLoop<L>
where
    L: LlmClient + ?Sized,
{
    llm: Arc<L>,
    tools: ToolRegistry,
    history: ConversationHistory,
    config: AgentConfig,
    /// Text deltas are forwarded here when streaming is on
    stream_tx: Option<mpsc::Sender<StreamChunk>>,
    usage: Usage,
}

impl<L> AgentLoop<L>
where
    L: LlmClient + ?Sized,
{
    pub fn new(llm: Arc<L>, tools: ToolRegistry, system_prompt: &str, config: AgentConfig) -> Self {
        let config = AgentConfig {
            max_turns: config.max_turns.max(1),
            ..config
        };
        Self {
            llm,
            tools,
            history: ConversationHistory::new(system_prompt),
            config,
            stream_tx: None,
            usage: Usage::default(),
        }
    }

    /// Stream model output into `tx` as it arrives
    pub fn with_stream(mut self, tx: mpsc::Sender<StreamChunk>) -> Self {
        self.stream_tx = Some(tx);
        self
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Token usage summed over every turn so far
    pub fn total_usage(&self) -> &Usage {
        &self.usage
    }

    /// Token that cancels in-flight model calls and pending tool calls
    pub fn cancellation_token(&self) -> CancellationToken {
        self.tools.context().cancellation().clone()
    }

    /// Replace a cancelled token so the next run can proceed
    pub fn renew_cancellation(&mut self) -> CancellationToken {
        self.tools.renew_cancellation()
    }

    /// Forget the conversation, keeping only the system message
    pub fn reset(&mut self) {
        self.history.reset();
        info!("Conversation reset");
    }

    /// Answer one user input.
    ///
    /// On any error the history is rolled back to what it was before the
    /// call, so a retry starts from a consistent state.
    pub async fn run(&mut self, input: &str) -> Result<String> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AgentError::EmptyInput);
        }

        let previous_len = self.history.len();
        self.history.push(Message::user(input));

        match self.run_turns().await {
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!("Run failed, rolling history back to {} messages: {}", previous_len, e);
                self.history.truncate(previous_len);
                Err(e)
            }
        }
    }

    async fn run_turns(&mut self) -> Result<String> {
        let definitions = self.tools.definitions();
        let max_turns = self.config.max_turns;

        for turn in 1..=max_turns {
            if self.tools.context().is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            info!("Turn {}/{}: sending {} messages", turn, max_turns, self.history.len());
            let request = CompletionRequest {
                messages: self.history.messages().to_vec(),
                tools: definitions.clone(),
                max_tokens: self.config.max_tokens,
                model: self.config.model.clone(),
            };

            let CompletionResponse {
                content,
                tool_calls,
                usage,
                ..
            } = self.request_completion(request).await?;
            self.usage.add(&usage);

            if tool_calls.is_empty() {
                if content.trim().is_empty() {
                    return Err(AgentError::EmptyResponse { turn });
                }
                info!("Turn {}: final answer ({} chars)", turn, content.len());
                self.history.push(Message::assistant(content.clone()));
                return Ok(content);
            }

            debug!(
                "Turn {}: {} tool calls: {:?}",
                turn,
                tool_calls.len(),
                tool_calls.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
            );
            self.history.push(Message::assistant_tool_calls(content, tool_calls.clone()));

            for (call_id, output) in self.tools.execute_all(&tool_calls).await {
                self.history.push(Message::tool_result(call_id, output));
            }
        }

        // A cancel during the last turn's tools must not read as budget exhaustion
        if self.tools.context().is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        warn!("Turn budget of {} exhausted", max_turns);
        Err(AgentError::BudgetExhausted { max_turns })
    }

    async fn request_completion(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let cancel = self.tools.context().cancellation().clone();
        let call = async {
            match &self.stream_tx {
                Some(tx) => self.llm.stream(request, tx.clone()).await,
                None => self.llm.complete(request).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            result = call => Ok(result?),
        }
    }
}
