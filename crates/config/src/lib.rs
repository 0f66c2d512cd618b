//! Configuration loading, validation, and management for Marionette.
//!
//! Loads configuration from `~/.marionette/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.marionette/config.toml`.
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

    /// Autopilot pipeline settings
    #[serde(default)]
    pub autopilot: AutopilotConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Text-to-speech proxy settings
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
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
            .field("autopilot", &self.autopilot)
            .field("gateway", &self.gateway)
            .field("speech", &self.speech)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("protocol", &self.protocol)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotConfig {
    /// Number of user/assistant exchanges kept per session
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Session used when a request names none
    #[serde(default = "default_session")]
    pub default_session: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overall deadline for one upstream response, including streaming
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_max_history() -> usize {
    10
}
fn default_session() -> String {
    "default".into()
}
fn default_connect_timeout() -> u64 {
    5
}
fn default_read_timeout() -> u64 {
    120
}

impl AutopilotConfig {
    /// Upper bound on stored turns per session.
    pub fn history_capacity(&self) -> usize {
        self.max_history * 2
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            default_session: default_session(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            system_prompt_override: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins. Empty = any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_port() -> u16 {
    8765
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// External TTS endpoint. Unset = speech disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_url: Option<String>,

    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_voice() -> String {
    "en-US-JennyNeural".into()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine_url: None,
            default_voice: default_voice(),
        }
    }
}

/// Streaming wire protocol spoken by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireProtocol {
    /// `data: {json}` event stream terminated by `data: [DONE]` (OpenAI-compatible)
    Sse,
    /// One JSON object per line with a `done` flag (Ollama)
    Ndjson,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Defaults by provider name: `ollama` speaks NDJSON, everything else SSE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<WireProtocol>,
}

impl ProviderConfig {
    pub fn protocol_for(&self, provider_name: &str) -> WireProtocol {
        self.protocol.unwrap_or_else(|| default_protocol(provider_name))
    }
}

/// Wire protocol assumed for a provider that does not configure one.
pub fn default_protocol(provider_name: &str) -> WireProtocol {
    match provider_name {
        "ollama" => WireProtocol::Ndjson,
        _ => WireProtocol::Sse,
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.marionette/config.toml).
    ///
    /// Also checks environment variables:
    /// - `MARIONETTE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `MARIONETTE_PROVIDER`
    /// - `MARIONETTE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
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

    /// Apply environment overrides through a lookup function.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("MARIONETTE_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }

        if let Some(provider) = var("MARIONETTE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = var("MARIONETTE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".marionette")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.autopilot.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "autopilot.max_history must be at least 1".into(),
            ));
        }

        if self.autopilot.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "autopilot.connect_timeout_secs must be > 0".into(),
            ));
        }

        if self.autopilot.read_timeout_secs < self.autopilot.connect_timeout_secs {
            return Err(ConfigError::ValidationError(
                "autopilot.read_timeout_secs must be >= connect_timeout_secs".into(),
            ));
        }

        if self.autopilot.default_session.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "autopilot.default_session must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// API key for a provider: its own key, else the global one.
    pub fn api_key_for(&self, provider_name: &str) -> Option<String> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            autopilot: AutopilotConfig::default(),
            gateway: GatewayConfig::default(),
            speech: SpeechConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
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
