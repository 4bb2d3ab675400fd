//! Configuration Store
//!
//! Loads and saves the TOML configuration file. Every section has defaults,
//! so an absent file or a partial file is always usable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KakomcpError, Result};

/// Unified kakomcp configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Remote match API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Poll and retry timing
    #[serde(default)]
    pub retry: RetryConfig,

    /// Board parameters used when creating an AI match
    #[serde(default)]
    pub ai_match: AiMatchConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).map_err(|e| KakomcpError::InvalidConfig {
            message: format!("{}: {}", path.as_ref().display(), e),
        })
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Render the configuration as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| KakomcpError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Load from an explicit path, else the default location, else defaults.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Get default config file path
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kakomcp").join("config.toml"))
    }

    /// Apply `KAKOMCP_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("KAKOMCP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("KAKOMCP_API_BASE_URL") {
            if !url.trim().is_empty() {
                self.api.base_url = url.trim().to_string();
            }
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Remote match API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the `/v1` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Substring of an API error message that marks a transition-step failure
    #[serde(default = "default_transition_marker")]
    pub transition_marker: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            transition_marker: default_transition_marker(),
        }
    }
}

/// Which key-value backend holds session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
}

/// Session store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend; defaults to the user data dir
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Record lifetime after the last write
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// How often expired records are purged; 0 disables the sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: None,
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Resolved directory for the file backend
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|d| d.join("kakomcp").join("sessions"))
            .ok_or_else(|| KakomcpError::InvalidConfig {
                message: "no data directory available; set store.path".to_string(),
            })
    }
}

/// Poll and retry timing, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Delay between "get match" polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Delay between action submissions refused mid-transition
    #[serde(default = "default_submit_retry")]
    pub submit_retry_ms: u64,

    /// Optional bound on attempts per loop; absent means retry forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            submit_retry_ms: default_submit_retry(),
            max_attempts: None,
        }
    }
}

/// Board parameters for `create-ai-game`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiMatchConfig {
    #[serde(default = "default_transition_sec")]
    pub transition_sec: u32,
    #[serde(default = "default_operation_sec")]
    pub operation_sec: u32,
    #[serde(default = "default_board_name")]
    pub board_name: String,
    #[serde(default = "default_n_agent")]
    pub n_agent: u32,
    #[serde(default = "default_total_turn")]
    pub total_turn: u32,
}

impl Default for AiMatchConfig {
    fn default() -> Self {
        Self {
            transition_sec: default_transition_sec(),
            operation_sec: default_operation_sec(),
            board_name: default_board_name(),
            n_agent: default_n_agent(),
            total_turn: default_total_turn(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "http://api.kakomimasu.com/v1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_transition_marker() -> String {
    "during the transition step".to_string()
}

fn default_ttl() -> u64 {
    60 * 60 * 24
}

fn default_sweep_interval() -> u64 {
    10 * 60
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_submit_retry() -> u64 {
    500
}

fn default_transition_sec() -> u32 {
    1
}

fn default_operation_sec() -> u32 {
    15
}

fn default_board_name() -> String {
    "A-2".to_string()
}

fn default_n_agent() -> u32 {
    3
}

fn default_total_turn() -> u32 {
    10
}
