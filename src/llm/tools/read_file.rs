//! read_file tool - read a file's contents up to a byte cap

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use super::{Tool, ToolContext, ToolError, parse_arguments};

pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    max_bytes: Option<i64>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file from disk. Output is capped at max_bytes (default 1 MiB) and flagged as truncated when the file is larger."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, absolute or relative to the working directory"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Maximum number of bytes to return"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: &str, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ReadFileArgs = parse_arguments(arguments)?;
        if args.path.trim().is_empty() {
            return Err(ToolError::InvalidInput("path is required".to_string()));
        }

        let path = ctx.paths.resolve(&args.path).map_err(ToolError::PathValidation)?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ToolError::NotFound { path }),
            Err(e) => return Err(ToolError::io("stat file", e)),
        };
        if metadata.is_dir() {
            return Err(ToolError::IsDirectory { path });
        }

        let cap = match args.max_bytes {
            Some(n) if n > 0 => n as u64,
            _ => ctx.max_read_bytes,
        };

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| ToolError::io("open file", e))?;

        // One byte past the cap tells us whether the file was longer
        let mut buf = Vec::new();
        file.take(cap.saturating_add(1))
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ToolError::io("read file", e))?;

        let truncated = buf.len() as u64 > cap;
        if truncated {
            buf.truncate(cap as usize);
        }
        debug!(
            "read_file: path={} size={} returned={} truncated={}",
            path.display(),
            metadata.len(),
            buf.len(),
            truncated
        );

        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "bytes": buf.len(),
            "truncated": truncated,
            "content": String::from_utf8_lossy(&buf),
        }))
    }
}
