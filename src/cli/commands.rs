//! CLI definition using clap.
//!
//! No subcommands: `--prompt` runs a single request, otherwise the REPL starts.

use clap::Parser;
use std::path::PathBuf;

use agent_skills::config::ConfigOverrides;

/// agent-skills - an LLM agent with sandboxed file and command tools
#[derive(Parser, Debug)]
#[command(name = "agent-skills")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the chat-completions API
    #[arg(long)]
    pub base_url: Option<String>,

    /// Maximum model round-trips per request
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Directory the tools may touch (repeatable)
    #[arg(long = "allowed-dir", value_name = "DIR")]
    pub allowed_dirs: Vec<PathBuf>,

    /// Allow tools to touch any path
    #[arg(long, conflicts_with = "allowed_dirs")]
    pub no_restrict: bool,

    /// Print answers only once they are complete
    #[arg(long)]
    pub no_stream: bool,

    /// Run a single prompt and exit
    #[arg(short, long)]
    pub prompt: Option<String>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_turns: self.max_turns,
            allowed_dirs: self.allowed_dirs.clone(),
            no_restrict: self.no_restrict,
            no_stream: self.no_stream,
        }
    }
}
