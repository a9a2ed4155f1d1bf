//! run_shell tool - run one command without a shell

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use super::{Tool, ToolContext, ToolError, parse_arguments};

pub struct RunShellTool;

#[derive(Debug, Deserialize)]
struct RunShellArgs {
    #[serde(default)]
    command: String,
    #[serde(default)]
    working_dir: String,
    #[serde(default)]
    timeout_seconds: Option<i64>,
}

#[async_trait]
impl Tool for RunShellTool {
    fn name(&self) -> &'static str {
        "run_shell"
    }

    fn description(&self) -> &'static str {
        "Run a single command with arguments. No shell is involved: pipes, redirection, chaining and substitution are rejected, as are shell interpreters and destructive commands."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command line, e.g. \"ls -la src\". Quotes and backslash escapes are honored."
                },
                "working_dir": {
                    "type": "string",
                    "description": "Directory to run in (default: current directory)"
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Kill the command after this many seconds (default 60)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: &str, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: RunShellArgs = parse_arguments(arguments)?;
        let raw = args.command.trim();
        if raw.is_empty() {
            return Err(ToolError::InvalidInput("command is required".to_string()));
        }

        let argv = ctx.commands.validate_command(raw)?;

        let working_dir = ctx
            .paths
            .resolve_working_dir(&args.working_dir)
            .map_err(ToolError::WorkingDirValidation)?;

        let timeout = args
            .timeout_seconds
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs as u64));

        info!("run_shell: {:?} in {:?}", argv, working_dir);
        let result = ctx.runner.run_argv(&argv, working_dir, timeout).await;
        debug!("run_shell: exit_code={} duration={}ms", result.exit_code, result.duration_ms);

        serde_json::to_value(&result).map_err(ToolError::Encode)
    }
}
