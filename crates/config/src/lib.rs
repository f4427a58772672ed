//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Stream replies token by token
    #[serde(default = "default_true")]
    pub stream: bool,

    /// System prompt sent ahead of the context block
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Context block limits
    #[serde(default)]
    pub context: ContextConfig,

    /// History submission limits
    #[serde(default)]
    pub history: HistoryConfig,

    /// Shell command execution
    #[serde(default)]
    pub shell: ShellConfig,

    /// Session persistence
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Keys found in vendor environment variables, by provider name
    #[serde(skip)]
    pub env_keys: HashMap<String, String>,
}

/// Vendor environment variables, consulted only for their own provider.
pub const VENDOR_KEY_VARS: &[(&str, &str)] = &[
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
    ("deepseek", "DEEPSEEK_API_KEY"),
    ("groq", "GROQ_API_KEY"),
    ("together", "TOGETHER_API_KEY"),
    ("fireworks", "FIREWORKS_API_KEY"),
];

/// Smallest accepted `context.max_chars`; below this a truncated context
/// block could not even hold its truncation notice.
pub const MIN_CONTEXT_CHARS: usize = 64;

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}
fn default_system_prompt() -> String {
    "You are a helpful assistant working in the user's terminal. \
     Answer concisely. When files or command output are provided as context, \
     refer to them by name."
        .into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("stream", &self.stream)
            .field("system_prompt", &self.system_prompt)
            .field("providers", &self.providers)
            .field("context", &self.context)
            .field("history", &self.history)
            .field("shell", &self.shell)
            .field("sessions", &self.sessions)
            .field("env_keys", &self.env_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Ceiling on the rendered context block, in characters
    #[serde(default = "default_context_max_chars")]
    pub max_chars: usize,
}

fn default_context_max_chars() -> usize {
    50_000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_context_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Most recent turns considered for submission
    #[serde(default = "default_history_max_turns")]
    pub max_turns: usize,

    /// Character budget for submitted turns
    #[serde(default = "default_history_max_chars")]
    pub max_chars: usize,
}

fn default_history_max_turns() -> usize {
    20
}
fn default_history_max_chars() -> usize {
    30_000
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_history_max_turns(),
            max_chars: default_history_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_timeout")]
    pub timeout_secs: u64,

    /// Combined stdout + stderr cap
    #[serde(default = "default_shell_max_output")]
    pub max_output_bytes: usize,

    /// Extra patterns that refuse a command outright
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_blocked: Vec<SafetyRuleConfig>,

    /// Extra patterns that require confirmation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_warned: Vec<SafetyRuleConfig>,
}

fn default_shell_timeout() -> u64 {
    30
}
fn default_shell_max_output() -> usize {
    1024 * 1024
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shell_timeout(),
            max_output_bytes: default_shell_max_output(),
            extra_blocked: vec![],
            extra_warned: vec![],
        }
    }
}

/// A user-supplied safety rule (regex pattern + reason shown on match).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyRuleConfig {
    pub pattern: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Override for the session directory (default: ~/.parley/sessions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Save the session after every assistant reply
    #[serde(default)]
    pub auto_save: bool,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables:
    /// - `PARLEY_API_KEY`, which replaces the global `api_key`
    /// - the vendor variables in [`VENDOR_KEY_VARS`], each used only for
    ///   its own provider
    /// - `PARLEY_PROVIDER`, `PARLEY_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_overrides(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_overrides(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Apply overrides from an environment lookup. Empty values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

        if let Some(key) = get("PARLEY_API_KEY") {
            self.api_key = Some(key);
        }
        for &(provider, var) in VENDOR_KEY_VARS {
            if let Some(key) = get(var) {
                self.env_keys.insert(provider.to_string(), key);
            }
        }
        if let Some(provider) = get("PARLEY_PROVIDER") {
            self.default_provider = provider;
        }
        if let Some(model) = get("PARLEY_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Directory holding saved sessions.
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions.dir {
            Some(dir) => PathBuf::from(dir),
            None => Self::config_dir().join("sessions"),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.history.max_turns == 0 || self.history.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "history.max_turns and history.max_chars must be > 0".into(),
            ));
        }

        if self.context.max_chars < MIN_CONTEXT_CHARS {
            return Err(ConfigError::ValidationError(format!(
                "context.max_chars must be at least {MIN_CONTEXT_CHARS}"
            )));
        }

        if self.shell.timeout_secs == 0 || self.shell.max_output_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "shell.timeout_secs and shell.max_output_bytes must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// API key for `provider`: its own configured key, else the global one
    /// (`PARLEY_API_KEY` or `api_key`), else its vendor variable.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
            .or_else(|| self.env_keys.get(provider).cloned())
    }

    /// Model for `provider`: its configured default, else the global default.
    pub fn model_for(&self, provider: &str) -> String {
        self.providers
            .get(provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| self.default_model.clone())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            stream: true,
            system_prompt: default_system_prompt(),
            providers: HashMap::new(),
            context: ContextConfig::default(),
            history: HistoryConfig::default(),
            shell: ShellConfig::default(),
            sessions: SessionsConfig::default(),
            env_keys: HashMap::new(),
        }
    }
}

/// The user's home directory.
pub fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
