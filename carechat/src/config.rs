//! Configuration for the sync engine.
//!
//! Defaults mirror the consultation platform's cadence (10s silent polls,
//! 2s typing debounce, 30s transport timeout). A host can override any
//! subset from a TOML fragment; missing keys keep their compiled defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Default silent poll cadence.
const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default typing inactivity window.
const DEFAULT_TYPING_IDLE_MS: u64 = 2_000;

/// Default bound on a single transport call.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default capacity of the notification channel.
const DEFAULT_NOTIFICATION_BUFFER: usize = 64;

/// `[sync]` section of the config file (all fields optional for partial
/// overrides).
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    poll_interval_ms: Option<u64>,
    typing_idle_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    notification_buffer: Option<usize>,
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    sync: SyncFileConfig,
}

/// Fully resolved engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Cadence of silent background refreshes.
    pub poll_interval: Duration,
    /// Typing indicator inactivity window.
    pub typing_idle: Duration,
    /// Upper bound on a single transport call (fetch or send).
    pub request_timeout: Duration,
    /// Capacity of the notification channel a [`ChannelBridge`] should use.
    ///
    /// [`ChannelBridge`]: crate::notify::ChannelBridge
    pub notification_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            typing_idle: Duration::from_millis(DEFAULT_TYPING_IDLE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
        }
    }
}

impl SyncConfig {
    /// Resolves a configuration from a TOML fragment layered over the
    /// compiled defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseToml`] if the fragment is not valid
    /// TOML for the expected schema.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            poll_interval: file
                .sync
                .poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            typing_idle: file
                .sync
                .typing_idle_ms
                .map_or(defaults.typing_idle, Duration::from_millis),
            request_timeout: file
                .sync
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
            notification_buffer: file
                .sync
                .notification_buffer
                .unwrap_or(defaults.notification_buffer),
        })
    }

    /// Loads configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadFile`] if the file cannot be read, or
    /// [`ConfigError::ParseToml`] if its contents are invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}
