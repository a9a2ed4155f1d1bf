//! CLI module for agent-skills - command-line flags and the interactive REPL.

pub mod commands;
pub mod repl;

pub use commands::Cli;
pub use repl::Repl;
