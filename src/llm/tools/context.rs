//! Tool execution context - the sandbox every tool call runs inside

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::exec::ProcessRunner;
use crate::security::{AllowedRoots, CommandPolicy, GuardError, PathGuard};

/// Read cap applied when a `read_file` call does not ask for one
pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024;

/// Execution context for tools, fixed for the lifetime of an agent
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Allowed roots and relative-path base
    pub paths: PathGuard,

    /// Shell syntax, interpreter and denylist rules
    pub commands: CommandPolicy,

    pub runner: ProcessRunner,

    /// Default `read_file` cap
    pub max_read_bytes: u64,

    cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(paths: PathGuard, commands: CommandPolicy, runner: ProcessRunner) -> Self {
        Self {
            paths,
            commands,
            runner,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            cancel: CancellationToken::new(),
        }
    }

    /// Context confined to `root`, with relative paths resolved against it
    pub fn sandboxed(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let roots = AllowedRoots::new([&root], &root);
        Self::new(PathGuard::new(roots, root), CommandPolicy::default(), ProcessRunner::default())
    }

    /// Context with no allowed-root restriction (for testing)
    pub fn unrestricted(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            PathGuard::new(AllowedRoots::unrestricted(), base_dir),
            CommandPolicy::default(),
            ProcessRunner::default(),
        )
    }

    pub fn with_max_read_bytes(mut self, max_read_bytes: u64) -> Self {
        if max_read_bytes > 0 {
            self.max_read_bytes = max_read_bytes;
        }
        self
    }

    /// Share a caller-owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn set_cancellation(&mut self, cancel: CancellationToken) {
        self.cancel = cancel;
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Directory relative paths resolve against
    pub fn base_dir(&self) -> &Path {
        self.paths.base_dir()
    }
}

/// Errors that can occur during tool execution.
///
/// None of these escape the registry: each is rendered into a failed
/// result envelope for the model.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),

    #[error("path validation failed: {0}")]
    PathValidation(#[source] GuardError),

    #[error("working directory validation failed: {0}")]
    WorkingDirValidation(#[source] GuardError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("path is a directory: {}", .path.display())]
    IsDirectory { path: PathBuf },

    #[error("file already exists: {} (set overwrite to replace it)", .path.display())]
    FileExists { path: PathBuf },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode result: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
}

impl ToolError {
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sandboxed_context_confines_paths() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path());

        assert_eq!(ctx.base_dir(), dir.path());
        assert_eq!(ctx.paths.resolve("a.txt").unwrap(), dir.path().join("a.txt"));
        assert!(ctx.paths.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn test_unrestricted_context_accepts_any_absolute_path() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::unrestricted(dir.path());
        assert!(ctx.paths.resolve("/etc/hosts").is_ok());
    }

    #[test]
    fn test_max_read_bytes_ignores_zero() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::sandboxed(dir.path()).with_max_read_bytes(0);
        assert_eq!(ctx.max_read_bytes, DEFAULT_MAX_READ_BYTES);

        let ctx = ctx.with_max_read_bytes(10);
        assert_eq!(ctx.max_read_bytes, 10);
    }

    #[test]
    fn test_shared_cancellation_token() {
        let dir = tempdir().unwrap();
        let token = CancellationToken::new();
        let ctx = ToolContext::sandboxed(dir.path()).with_cancellation(token.clone());

        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_tool_error_messages() {
        let err = ToolError::PathValidation(GuardError::Traversal {
            path: "../x".to_string(),
        });
        assert_eq!(err.to_string(), "path validation failed: path traversal not allowed: ../x");

        let err: ToolError = GuardError::DangerousCommand { name: "rm".to_string() }.into();
        assert_eq!(err.to_string(), "dangerous command not allowed: rm");

        assert_eq!(ToolError::Cancelled.to_string(), "operation cancelled");
        assert_eq!(
            ToolError::UnknownTool {
                name: "delete_all".to_string()
            }
            .to_string(),
            "unknown tool: delete_all"
        );
    }
}
