//! Tool registry - dispatches model tool calls and wraps every outcome in an envelope

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{ToolContext, ToolError, ToolKind, ToolResult};
use crate::llm::types::{ToolCall, ToolDefinition};

/// Fixed set of tools bound to one sandbox context
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolKind>,
    ctx: ToolContext,
}

impl ToolRegistry {
    /// Registry exposing every tool
    pub fn standard(ctx: ToolContext) -> Self {
        Self::with_tools(ctx, ToolKind::ALL)
    }

    /// Registry exposing a subset of tools
    pub fn with_tools(ctx: ToolContext, tools: impl IntoIterator<Item = ToolKind>) -> Self {
        let mut kinds: Vec<ToolKind> = Vec::new();
        for kind in tools {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Self { tools: kinds, ctx }
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Swap in a fresh cancellation token, e.g. after a cancelled run
    pub fn renew_cancellation(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        self.ctx.set_cancellation(token.clone());
        token
    }

    /// Get tool definitions for the LLM
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|kind| kind.tool().definition()).collect()
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|kind| kind.name()).collect()
    }

    fn lookup(&self, name: &str) -> Option<ToolKind> {
        ToolKind::from_name(name).filter(|kind| self.tools.contains(kind))
    }

    /// Execute a tool call and return the JSON envelope for the model.
    ///
    /// Never fails: unknown tools, bad arguments, guard rejections and a
    /// cancelled context all come back as `{"ok": false, ...}`.
    pub async fn execute(&self, call: &ToolCall) -> String {
        self.dispatch(call).await.to_json()
    }

    async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        if self.ctx.is_cancelled() {
            debug!("Skipping tool {} ({}): cancelled", call.name, call.id);
            return ToolResult::failure(&call.name, ToolError::Cancelled);
        }

        let Some(kind) = self.lookup(&call.name) else {
            warn!("Model requested unknown tool: {}", call.name);
            return ToolResult::failure(
                &call.name,
                ToolError::UnknownTool {
                    name: call.name.clone(),
                },
            );
        };

        info!("Executing tool {} ({})", call.name, call.id);
        debug!("Tool arguments: {}", call.arguments);

        match kind.tool().execute(&call.arguments, &self.ctx).await {
            Ok(data) => ToolResult::success(kind.name(), data),
            Err(e) => {
                info!("Tool {} failed: {}", call.name, e);
                ToolResult::failure(kind.name(), e)
            }
        }
    }

    /// Execute tool calls sequentially, in order, pairing each result with its call ID
    pub async fn execute_all(&self, calls: &[ToolCall]) -> Vec<(String, String)> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let result = self.execute(call).await;
            results.push((call.id.clone(), result));
        }

        results
    }
}
