use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

mod cli;

use agent_skills::agent::AgentLoop;
use agent_skills::config::Config;
use agent_skills::llm::{OpenAiClient, ToolRegistry, create_stream_channel};
use cli::{Cli, Repl};

fn setup_logging(level: &str) -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-skills")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("agent-skills.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG, when set, replaces the configured level
    env_logger::Builder::new()
        .parse_filters(level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    let base_dir = std::env::current_dir().context("Failed to determine working directory")?;

    let llm = Arc::new(OpenAiClient::new(config.openai_config()).context("Failed to create LLM client")?);
    let ctx = config.tool_context(&base_dir);
    info!(
        "Agent: model={} roots={:?} max_turns={}",
        config.llm.model,
        ctx.paths.roots().as_slice(),
        config.agent.max_turns
    );

    let tools = ToolRegistry::standard(ctx);
    let mut agent = AgentLoop::new(llm, tools, &config.agent.system_prompt, config.agent_config());

    let stream_rx = if config.agent.stream {
        let (tx, rx) = create_stream_channel(100);
        agent = agent.with_stream(tx);
        Some(rx)
    } else {
        None
    };
    let mut repl = Repl::new(agent, stream_rx.map(|handle| handle.receiver));

    match &cli.prompt {
        Some(prompt) => {
            let answer = repl.ask(prompt).await.context("Request failed")?;
            repl.print_answer(&answer);
            Ok(())
        }
        None => repl.run().await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration, then layer environment and flags on top
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.apply_env();
    config.apply_overrides(cli.to_overrides());

    let level = if cli.is_verbose() {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    let log_file = setup_logging(&level).context("Failed to setup logging")?;

    if cli.is_verbose() {
        eprintln!("{} {}", "Logging to".yellow(), log_file.display());
    }
    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
