//! TOML Configuration File Support
//!
//! Centralized configuration loading for chatstream, from a TOML file at
//! `~/.config/chatstream/config.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied in this order, later layers winning:
//! 1. Default values
//! 2. TOML configuration file
//! 3. Environment variables
//! 4. CLI arguments (via [`ConfigOverrides`])
//!
//! # XDG Base Directory Compliance
//!
//! - Config: `$XDG_CONFIG_HOME/chatstream/config.toml`
//! - Data: `$XDG_DATA_HOME/chatstream/` (conversation history)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! endpoint = "http://localhost:8080/v1/chat/completions"
//! model = "auto"
//! connect_timeout_ms = 10000
//! request_timeout_secs = 300
//!
//! [storage]
//! data_dir = "/home/me/.local/share/chatstream"
//!
//! [stream]
//! channel_capacity = 100
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::ModelSelector;
use crate::streaming::DEFAULT_CHANNEL_CAPACITY;

/// Default completion endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/v1/chat/completions";

/// Default connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Default whole-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Chat-completion endpoint URL
    pub endpoint: Option<String>,

    /// Model identifier, or `auto`
    pub model: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Whole-request timeout in seconds (0 = no timeout)
    pub request_timeout_secs: Option<u64>,
}

/// Storage section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageToml {
    /// Directory holding conversation history
    pub data_dir: Option<PathBuf>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Capacity of the session event channel
    pub channel_capacity: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Storage configuration section
    pub storage: StorageToml,

    /// Stream configuration section
    pub stream: StreamToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved chatstream configuration
///
/// Use [`load_config`] to build one with proper priority handling.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Model carried in every request
    pub model: ModelSelector,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Whole-request timeout; `None` streams for as long as the server does
    pub request_timeout: Option<Duration>,

    /// Directory holding conversation history
    pub data_dir: PathBuf,

    /// Capacity of the session event channel
    pub channel_capacity: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: ModelSelector::Auto,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            request_timeout: Some(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            data_dir: default_data_dir(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ChatConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would otherwise fail later and less clearly
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "endpoint must be an http:// or https:// URL, got '{}'",
                self.endpoint
            )));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "channel_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/chatstream/config.toml` or
/// `~/.config/chatstream/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatstream").join("config.toml"))
}

/// Get the default data directory
///
/// Falls back to `./.chatstream` when no data directory is known.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("chatstream"))
        .unwrap_or_else(|| PathBuf::from(".chatstream"))
}

/// Load configuration from all sources with proper priority
///
/// CLI arguments are not handled here; apply [`ConfigOverrides`] afterwards.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// If `path` is `None`, only defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ChatConfig, ConfigError> {
    let mut config = ChatConfig::default();

    if let Some(ref config_path) = path {
        if let Some(toml_content) = read_config_file(config_path)? {
            let toml_config: ChatToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

fn read_config_file(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ChatConfig, toml: &ChatToml) {
    // Backend settings
    if let Some(ref endpoint) = toml.backend.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(ref model) = toml.backend.model {
        config.model = ModelSelector::parse(model);
    }
    if let Some(ms) = toml.backend.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = toml.backend.request_timeout_secs {
        config.request_timeout = request_timeout(secs);
    }

    // Storage settings
    if let Some(ref dir) = toml.storage.data_dir {
        config.data_dir = dir.clone();
    }

    // Stream settings
    if let Some(capacity) = toml.stream.channel_capacity {
        config.channel_capacity = capacity;
    }
}

/// Apply environment variable overrides to the config
///
/// `lookup` resolves a variable name to its value.
fn apply_env_config(config: &mut ChatConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(endpoint) = lookup("CHATSTREAM_ENDPOINT") {
        config.endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = lookup("CHATSTREAM_MODEL") {
        config.model = ModelSelector::parse(&model);
        config.source = ConfigSource::Env;
    }
    if let Some(dir) = lookup("CHATSTREAM_DATA_DIR") {
        config.data_dir = PathBuf::from(dir);
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = lookup("CHATSTREAM_CONNECT_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(timeout) = lookup("CHATSTREAM_REQUEST_TIMEOUT") {
        if let Ok(secs) = timeout.parse::<u64>() {
            config.request_timeout = request_timeout(secs);
            config.source = ConfigSource::Env;
        }
    }
}

fn request_timeout(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Endpoint override
    pub endpoint: Option<String>,

    /// Model override
    pub model: Option<String>,

    /// Data directory override
    pub data_dir: Option<PathBuf>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set endpoint override
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set data directory override
    #[must_use]
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = Some(dir);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ChatConfig) {
        if self.endpoint.is_some() || self.model.is_some() || self.data_dir.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref endpoint) = self.endpoint {
            config.endpoint = endpoint.clone();
        }

        if let Some(ref model) = self.model {
            config.model = ModelSelector::parse(model);
        }

        if let Some(ref dir) = self.data_dir {
            config.data_dir = dir.clone();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
