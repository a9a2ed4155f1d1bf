use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{AgentConfig, DEFAULT_MAX_TURNS};
use crate::error::AgentError;
use crate::exec::{DEFAULT_COMMAND_TIMEOUT, EnvAllowlist, ProcessRunner};
use crate::llm::openai::{DEFAULT_API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::llm::tools::DEFAULT_MAX_READ_BYTES;
use crate::llm::{OpenAiConfig, ToolContext};
use crate::security::{AllowedRoots, CommandPolicy, PathGuard};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. You can read and write files and run \
     commands inside the allowed directories using the provided tools. Use them when they help answer the user.";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub llm: LlmConfig,
    pub agent: LoopConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_ms: u64,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_ms: 300000,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_turns: u32,
    pub stream: bool,
    pub system_prompt: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            stream: true,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// `None` confines tools to the working directory; an empty list lifts the restriction
    pub allowed_dirs: Option<Vec<PathBuf>>,
    pub max_read_bytes: u64,
    pub command_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            allowed_dirs: None,
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT.as_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            llm: LlmConfig::default(),
            agent: LoopConfig::default(),
            sandbox: SandboxConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub max_turns: Option<u32>,
    pub allowed_dirs: Vec<PathBuf>,
    pub no_restrict: bool,
    pub no_stream: bool,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AgentError::Config("llm.model must not be empty".to_string()));
        }
        if self.llm.base_url.trim().is_empty() {
            return Err(AgentError::Config("llm.base_url must not be empty".to_string()));
        }
        if self.llm.api_key_env.trim().is_empty() {
            return Err(AgentError::Config("llm.api_key_env must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply `OPENAI_MODEL` and `OPENAI_BASE_URL` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("OPENAI_MODEL").filter(|v| !v.trim().is_empty()) {
            log::debug!("Model overridden by OPENAI_MODEL: {}", model);
            self.llm.model = model.trim().to_string();
        }
        if let Some(base_url) = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            log::debug!("Base URL overridden by OPENAI_BASE_URL: {}", base_url);
            self.llm.base_url = base_url.trim().to_string();
        }
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(model) = overrides.model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.base_url {
            self.llm.base_url = base_url;
        }
        if let Some(max_turns) = overrides.max_turns {
            self.agent.max_turns = max_turns;
        }
        if overrides.no_restrict {
            self.sandbox.allowed_dirs = Some(Vec::new());
        } else if !overrides.allowed_dirs.is_empty() {
            self.sandbox.allowed_dirs = Some(overrides.allowed_dirs);
        }
        if overrides.no_stream {
            self.agent.stream = false;
        }
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            model: self.llm.model.clone(),
            base_url: self.llm.base_url.clone(),
            api_key_env: self.llm.api_key_env.clone(),
            max_tokens: self.llm.max_tokens,
            timeout: Duration::from_millis(self.llm.timeout_ms),
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_turns: self.agent.max_turns.max(1),
            max_tokens: self.llm.max_tokens,
            model: None,
        }
    }

    /// Roots the tools are confined to, made absolute against `base_dir`
    pub fn allowed_roots(&self, base_dir: &Path) -> AllowedRoots {
        match &self.sandbox.allowed_dirs {
            None => AllowedRoots::new([base_dir], base_dir),
            Some(dirs) => AllowedRoots::new(dirs, base_dir),
        }
    }

    /// Sandbox for tool calls, with relative paths resolved against `base_dir`
    pub fn tool_context(&self, base_dir: &Path) -> ToolContext {
        let runner = ProcessRunner::new(
            EnvAllowlist::default(),
            Duration::from_secs(self.sandbox.command_timeout_secs),
        );
        ToolContext::new(
            PathGuard::new(self.allowed_roots(base_dir), base_dir),
            CommandPolicy::default(),
            runner,
        )
        .with_max_read_bytes(self.sandbox.max_read_bytes)
    }
}
