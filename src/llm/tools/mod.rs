//! Tool system for LLM interactions
//!
//! Tools give the model file access and command execution inside the sandbox
//! described by a [`ToolContext`]. The set of tools is closed: [`ToolKind`]
//! names every one of them.

mod context;
mod executor;
mod read_file;
mod run_shell;
mod write_file;

pub use context::{DEFAULT_MAX_READ_BYTES, ToolContext, ToolError};
pub use executor::ToolRegistry;
pub use read_file::ReadFileTool;
pub use run_shell::RunShellTool;
pub use write_file::WriteFileTool;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::ToolDefinition;

/// A tool that can be called by the LLM
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the model's function name)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool against raw JSON arguments and return its payload
    async fn execute(&self, arguments: &str, ctx: &ToolContext) -> Result<Value, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

/// Every tool the registry can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    WriteFile,
    RunShell,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [ToolKind::ReadFile, ToolKind::WriteFile, ToolKind::RunShell];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn name(&self) -> &'static str {
        self.tool().name()
    }

    /// Implementation behind this kind
    pub fn tool(&self) -> &'static dyn Tool {
        match self {
            ToolKind::ReadFile => &ReadFileTool,
            ToolKind::WriteFile => &WriteFileTool,
            ToolKind::RunShell => &RunShellTool,
        }
    }
}

/// The envelope returned to the model for every tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool: impl Into<String>, data: Value) -> Self {
        Self {
            ok: true,
            tool: tool.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(tool: impl Into<String>, error: impl ToString) -> Self {
        Self {
            ok: false,
            tool: tool.into(),
            data: None,
            error: Some(error.to_string()),
        }
    }

    /// Render as the JSON text handed back to the model
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::warn!("Failed to encode {} result: {}", self.tool, e);
            serde_json::json!({
                "ok": false,
                "tool": self.tool,
                "error": format!("failed to encode result: {}", e),
            })
            .to_string()
        })
    }
}

/// Decode tool arguments; a blank argument string counts as `{}`
pub(crate) fn parse_arguments<T: DeserializeOwned>(arguments: &str) -> Result<T, ToolError> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments).map_err(ToolError::InvalidArguments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_kind_names() {
        assert_eq!(ToolKind::ReadFile.name(), "read_file");
        assert_eq!(ToolKind::WriteFile.name(), "write_file");
        assert_eq!(ToolKind::RunShell.name(), "run_shell");
        assert_eq!(ToolKind::from_name("run_shell"), Some(ToolKind::RunShell));
        assert_eq!(ToolKind::from_name("run_python"), None);
    }

    #[test]
    fn test_definitions_match_schemas() {
        for kind in ToolKind::ALL {
            let def = kind.tool().definition();
            assert_eq!(def.name, kind.name());
            assert_eq!(def.input_schema["type"], "object");
            assert!(def.input_schema["required"].is_array());
        }
    }

    #[test]
    fn test_tool_result_success_envelope() {
        let json = ToolResult::success("write_file", serde_json::json!({"path": "/s/a", "bytes": 2})).to_json();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["ok"], true);
        assert_eq!(value["tool"], "write_file");
        assert_eq!(value["data"]["bytes"], 2);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_tool_result_failure_envelope() {
        let json = ToolResult::failure("run_shell", "dangerous command not allowed: rm").to_json();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["ok"], false);
        assert_eq!(value["error"], "dangerous command not allowed: rm");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_tool_result_escapes_error_text() {
        let json = ToolResult::failure("read_file", "bad \"quote\"\nand newline").to_json();
        let back: ToolResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error.as_deref(), Some("bad \"quote\"\nand newline"));
    }

    #[test]
    fn test_parse_arguments_blank_is_empty_object() {
        #[derive(Deserialize)]
        struct Args {
            #[serde(default)]
            path: String,
        }
        let args: Args = parse_arguments("  ").unwrap();
        assert!(args.path.is_empty());
        assert!(matches!(
            parse_arguments::<Args>("{not json"),
            Err(ToolError::InvalidArguments(_))
        ));
    }
}
