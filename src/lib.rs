//! agent-skills - sandboxed tools and a bounded tool-calling loop for LLM agents
//!
//! The model gets three tools (`read_file`, `write_file`, `run_shell`). Every
//! path they touch is checked against a set of allowed directories, every
//! command is parsed without a shell and screened against a denylist, and the
//! agent loop caps how many model round-trips one request may take.

pub mod agent;
pub mod config;
pub mod error;
pub mod exec;
pub mod llm;
pub mod security;

pub use error::{AgentError, Result};
