//! write_file tool - create or overwrite a file

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use super::{Tool, ToolContext, ToolError, parse_arguments};

pub struct WriteFileTool;

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    overwrite: bool,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file on disk, creating parent directories. Existing files are only replaced when overwrite is true."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, absolute or relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "Complete file content"
                },
                "overwrite": {
                    "type": "boolean",
                    "description": "Replace the file if it already exists (default false)"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: &str, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: WriteFileArgs = parse_arguments(arguments)?;
        if args.path.trim().is_empty() {
            return Err(ToolError::InvalidInput("path is required".to_string()));
        }
        let content = args
            .content
            .ok_or_else(|| ToolError::InvalidInput("content is required".to_string()))?;

        let path = ctx.paths.resolve(&args.path).map_err(ToolError::PathValidation)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io("create parent directories", e))?;
        }

        if args.overwrite {
            tokio::fs::write(&path, content.as_bytes())
                .await
                .map_err(|e| ToolError::io("write file", e))?;
        } else {
            // create_new refuses an existing file atomically
            let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(f) => f,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    return Err(ToolError::FileExists { path });
                }
                Err(e) => return Err(ToolError::io("create file", e)),
            };
            file.write_all(content.as_bytes())
                .await
                .map_err(|e| ToolError::io("write file", e))?;
            file.flush().await.map_err(|e| ToolError::io("flush file", e))?;
        }

        debug!(
            "write_file: path={} bytes={} overwrite={}",
            path.display(),
            content.len(),
            args.overwrite
        );

        Ok(serde_json::json!({
            "path": path.display().to_string(),
            "bytes": content.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_file_creates_new() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        let data = WriteFileTool
            .execute(r#"{"path": "hello.txt", "content": "hi"}"#, &ctx)
            .await
            .unwrap();

        assert_eq!(data["bytes"], 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_write_file_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        WriteFileTool
            .execute(r#"{"path": "a/b/c/deep.txt", "content": "nested"}"#, &ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("a/b/c/deep.txt")).unwrap(), "nested");
    }

    #[tokio::test]
    async fn test_write_file_refuses_existing_without_overwrite() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        WriteFileTool
            .execute(r#"{"path": "keep.txt", "content": "first"}"#, &ctx)
            .await
            .unwrap();
        let err = WriteFileTool
            .execute(r#"{"path": "keep.txt", "content": "second"}"#, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::FileExists { .. }));
        assert_eq!(std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(), "first");
    }

    #[tokio::test]
    async fn test_write_file_overwrite() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());
        std::fs::write(dir.path().join("f.txt"), "old content").unwrap();

        WriteFileTool
            .execute(r#"{"path": "f.txt", "content": "new", "overwrite": true}"#, &ctx)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_file_empty_content_allowed() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        let data = WriteFileTool
            .execute(r#"{"path": "empty.txt", "content": ""}"#, &ctx)
            .await
            .unwrap();
        assert_eq!(data["bytes"], 0);
    }

    #[tokio::test]
    async fn test_write_file_requires_content() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        let err = WriteFileTool.execute(r#"{"path": "x.txt"}"#, &ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "content is required");
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn test_write_file_traversal_rejected() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        let err = WriteFileTool
            .execute(r#"{"path": "../escape.txt", "content": "x"}"#, &ctx)
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::PathValidation(_)));
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }
}
