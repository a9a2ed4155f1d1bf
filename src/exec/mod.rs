//! Subprocess execution
//!
//! Commands reaching this module have already been validated by the
//! security guards. The runner adds the remaining runtime limits: a wall-clock
//! deadline and a scrubbed environment.

mod env;
mod runner;

pub use env::EnvAllowlist;
pub use runner::{CommandResult, DEFAULT_COMMAND_TIMEOUT, ProcessRunner, TIMEOUT_EXIT_CODE};
