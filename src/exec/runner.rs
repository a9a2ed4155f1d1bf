//! Process runner - deadline-bounded command execution with captured output

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::EnvAllowlist;

/// Applied when the caller gives no timeout or a zero one
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Exit code reported when the process was killed at its deadline or never ran
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// After the child exits, how long to keep draining pipes held open by grandchildren
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

const STDERR_PREVIEW_BYTES: usize = 500;

/// Outcome of one command execution.
///
/// Non-zero exits and timeouts are data, not errors: the caller always gets
/// one of these back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE && self.error.as_deref().is_some_and(|e| e.contains("timed out"))
    }
}

/// Spawns validated commands with a scrubbed environment and a deadline
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    env: EnvAllowlist,
    default_timeout: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(EnvAllowlist::default(), DEFAULT_COMMAND_TIMEOUT)
    }
}

impl ProcessRunner {
    pub fn new(env: EnvAllowlist, default_timeout: Duration) -> Self {
        let default_timeout = if default_timeout.is_zero() {
            DEFAULT_COMMAND_TIMEOUT
        } else {
            default_timeout
        };
        Self { env, default_timeout }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run `program` with `args`.
    ///
    /// `working_dir` of `None` inherits the current directory. A `timeout` of
    /// `None` or zero falls back to the runner default. On expiry the child is
    /// killed and the result carries [`TIMEOUT_EXIT_CODE`].
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> CommandResult {
        let timeout = match timeout {
            Some(t) if !t.is_zero() => t,
            _ => self.default_timeout,
        };
        debug!(
            "run: command={} args={:?} working_dir={:?} timeout={:?}",
            program, args, working_dir, timeout
        );

        let mut result = CommandResult {
            command: program.to_string(),
            args: args.to_vec(),
            working_dir: working_dir.map(|d| d.display().to_string()).unwrap_or_default(),
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            error: None,
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(self.env.current())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start {}: {}", program, e);
                result.exit_code = TIMEOUT_EXIT_CODE;
                result.error = Some(format!("failed to start {}: {}", program, e));
                result.duration_ms = elapsed_ms(start);
                return result;
            }
        };

        let stdout_reader = child.stdout.take().map(PipeReader::spawn);
        let stderr_reader = child.stderr.take().map(PipeReader::spawn);

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                result.exit_code = status.code().unwrap_or(TIMEOUT_EXIT_CODE);
                if !status.success() {
                    result.error = Some(status.to_string());
                }
            }
            Ok(Err(e)) => {
                result.exit_code = TIMEOUT_EXIT_CODE;
                result.error = Some(format!("failed to wait for {}: {}", program, e));
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out process {}: {}", program, e);
                }
                info!("Command {} timed out after {:?}", program, timeout);
                result.exit_code = TIMEOUT_EXIT_CODE;
                result.error = Some(format!("command timed out after {}s", timeout.as_secs_f64()));
            }
        }

        let deadline = tokio::time::Instant::now() + PIPE_DRAIN_GRACE;
        let (stdout, stderr) = tokio::join!(drain(stdout_reader, deadline), drain(stderr_reader, deadline));
        result.stdout = stdout;
        result.stderr = stderr;
        result.duration_ms = elapsed_ms(start);

        debug!(
            "run: completed exit_code={} duration={}ms stdout={} bytes stderr={} bytes",
            result.exit_code,
            result.duration_ms,
            result.stdout.len(),
            result.stderr.len()
        );
        if !result.stderr.is_empty() {
            debug!("run: stderr: {}", preview(&result.stderr, STDERR_PREVIEW_BYTES));
        }

        result
    }

    /// Convenience wrapper taking a whole argv
    pub async fn run_argv(
        &self,
        argv: &[String],
        working_dir: Option<PathBuf>,
        timeout: Option<Duration>,
    ) -> CommandResult {
        match argv.split_first() {
            Some((program, args)) => self.run(program, args, working_dir.as_deref(), timeout).await,
            None => CommandResult {
                command: String::new(),
                args: Vec::new(),
                working_dir: working_dir.map(|d| d.display().to_string()).unwrap_or_default(),
                exit_code: TIMEOUT_EXIT_CODE,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
                error: Some("command is required".to_string()),
            },
        }
    }
}

/// Bytes read from one child pipe so far, plus the task still reading it
struct PipeReader {
    captured: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(mut reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let task = tokio::spawn(async move {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!("Output pipe closed with error: {}", e);
                        break;
                    }
                }
            }
        });
        Self { captured, task }
    }

    /// Wait for EOF until `deadline`, then return whatever was captured
    async fn finish(mut self, deadline: tokio::time::Instant) -> String {
        if tokio::time::timeout_at(deadline, &mut self.task).await.is_err() {
            debug!("Output pipe still held open at deadline, keeping captured bytes");
            self.task.abort();
        }
        let bytes = self.captured.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

async fn drain(reader: Option<PipeReader>, deadline: tokio::time::Instant) -> String {
    match reader {
        Some(reader) => reader.finish(deadline).await,
        None => String::new(),
    }
}

fn preview(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
