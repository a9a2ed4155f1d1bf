//! Security boundary for tool execution
//!
//! Every filesystem path and every command an agent asks for passes through
//! this module before anything touches the host:
//! - `command_line`: shell-free argv tokenizer
//! - `path_guard`: allowed-root enforcement and traversal rejection
//! - `command_guard`: shell syntax, shell interpreter and denylist checks

pub mod command_guard;
pub mod command_line;
pub mod path_guard;

pub use command_guard::CommandPolicy;
pub use command_line::parse_command_line;
pub use path_guard::{AllowedRoots, PathGuard, clean_path};

use std::path::PathBuf;

/// Validation failures raised by the security guards
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("path cannot be empty")]
    EmptyPath,

    #[error("path traversal not allowed: {path}")]
    Traversal { path: String },

    #[error("path outside allowed directories: {} (allowed: {})", .path.display(), format_roots(.roots))]
    OutsideAllowedRoots { path: PathBuf, roots: Vec<PathBuf> },

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("command is required")]
    EmptyCommand,

    #[error("invalid command: {0}")]
    MalformedCommand(String),

    #[error("shell control syntax not allowed: {token:?}")]
    BlockedSyntax { token: String },

    #[error("shell executables are not allowed: {name}")]
    ShellInterpreter { name: String },

    #[error("dangerous command not allowed: {name}")]
    DangerousCommand { name: String },
}

fn format_roots(roots: &[PathBuf]) -> String {
    roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
