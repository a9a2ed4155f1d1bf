//! Line-oriented REPL and one-shot runner on stdin/stdout.

use std::io::Write;

use colored::Colorize;
use eyre::{Context, Result};
use log::{debug, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use agent_skills::agent::AgentLoop;
use agent_skills::error::AgentError;
use agent_skills::llm::{LlmClient, StreamChunk};

const HELP: &str = "Commands:
  /help, /h            Show this help
  /clear, /c, /reset   Forget the conversation
  /quit, /exit, /q     Exit
Anything else is sent to the agent. Ctrl-C cancels a running request.";

/// Slash commands understood by the REPL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Clear,
    Quit,
    Unknown,
}

impl ReplCommand {
    /// `None` when the line is not a slash command
    pub fn parse(line: &str) -> Option<Self> {
        let word = line.trim().strip_prefix('/')?;
        let word = word.split_whitespace().next().unwrap_or_default();
        Some(match word.to_lowercase().as_str() {
            "help" | "h" => Self::Help,
            "clear" | "c" | "reset" => Self::Clear,
            "quit" | "exit" | "q" => Self::Quit,
            _ => Self::Unknown,
        })
    }
}

pub struct Repl<L>
where
    L: LlmClient + ?Sized,
{
    agent: AgentLoop<L>,
    /// Receives deltas when the agent was built with a stream sender
    stream_rx: Option<mpsc::Receiver<StreamChunk>>,
}

impl<L> Repl<L>
where
    L: LlmClient + ?Sized,
{
    pub fn new(agent: AgentLoop<L>, stream_rx: Option<mpsc::Receiver<StreamChunk>>) -> Self {
        Self { agent, stream_rx }
    }

    /// Read lines until EOF or `/quit`
    pub async fn run(&mut self) -> Result<()> {
        self.print_banner();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", ">".bold().blue());
            std::io::stdout().flush().context("Failed to flush stdout")?;

            let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
                println!();
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match ReplCommand::parse(line) {
                Some(ReplCommand::Quit) => break,
                Some(ReplCommand::Help) => println!("{}", HELP),
                Some(ReplCommand::Clear) => {
                    self.agent.reset();
                    println!("{}", "Conversation cleared.".dimmed());
                }
                Some(ReplCommand::Unknown) => {
                    println!("{} {} (try /help)", "Unknown command:".yellow(), line);
                }
                None => match self.ask(line).await {
                    Ok(answer) => self.print_answer(&answer),
                    Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
                },
            }
        }

        let usage = self.agent.total_usage();
        info!(
            "Session finished: {} input tokens, {} output tokens",
            usage.input_tokens, usage.output_tokens
        );
        Ok(())
    }

    /// Run one request, printing streamed text as it arrives and
    /// cancelling on Ctrl-C.
    pub async fn ask(&mut self, input: &str) -> std::result::Result<String, AgentError> {
        let token = self.agent.cancellation_token();
        let mut streamed = false;

        let result = {
            let run = self.agent.run(input);
            tokio::pin!(run);
            let mut cancel_requested = false;

            loop {
                tokio::select! {
                    result = &mut run => break result,
                    Some(chunk) = recv_chunk(&mut self.stream_rx) => {
                        streamed |= print_chunk(chunk);
                    }
                    signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                        if signal.is_ok() {
                            debug!("Ctrl-C received, cancelling run");
                            cancel_requested = true;
                            token.cancel();
                        }
                    }
                }
            }
        };

        if let Some(rx) = self.stream_rx.as_mut() {
            while let Ok(chunk) = rx.try_recv() {
                streamed |= print_chunk(chunk);
            }
        }
        if streamed {
            println!();
        }

        if token.is_cancelled() {
            self.agent.renew_cancellation();
        }
        result
    }

    /// Print a final answer unless it was already streamed
    pub fn print_answer(&self, answer: &str) {
        if self.stream_rx.is_none() {
            println!("{}", answer);
        }
    }

    fn print_banner(&self) {
        let ctx = self.agent.tools().context();
        let roots = ctx.paths.roots();
        let roots = if roots.is_empty() {
            "unrestricted".to_string()
        } else {
            roots
                .as_slice()
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("{}", "agent-skills".bold().green());
        println!(
            "  tools: {} | allowed: {} | max turns: {}",
            self.agent.tools().tool_names().join(", "),
            roots,
            self.agent.config().max_turns
        );
        println!("  {}\n", "Type /help for commands, /quit to exit".dimmed());
    }
}

async fn recv_chunk(rx: &mut Option<mpsc::Receiver<StreamChunk>>) -> Option<StreamChunk> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Print one stream chunk, returning whether any answer text was written
fn print_chunk(chunk: StreamChunk) -> bool {
    match chunk {
        StreamChunk::Text(text) => {
            print!("{}", text);
            let _ = std::io::stdout().flush();
            true
        }
        StreamChunk::ToolCall { name, .. } => {
            println!("{}", format!("  [{}]", name).cyan());
            false
        }
        StreamChunk::Done => false,
        StreamChunk::Error(e) => {
            debug!("Stream error: {}", e);
            false
        }
    }
}
