// Configuration module for the quizlink player

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::presence::PresenceSettings;
use crate::core::reconnect::ReconnectPolicy;
use crate::core::session::TimingSettings;

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// Host connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base HTTP URL serving `/api/host-info`. Empty = derive from host/port.
    #[serde(default)]
    pub discovery_url: String,
    /// WebSocket URL used when discovery fails. Empty = derive from host/port.
    #[serde(default)]
    pub static_url: String,
    /// Host for the derived fallback URL
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Use `wss://` / `https://` for derived URLs
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_discovery_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_reconnect_base_ms() -> u64 {
    1000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    15
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            discovery_url: String::new(),
            static_url: String::new(),
            host: default_host(),
            port: default_port(),
            secure: false,
            discovery_timeout_ms: default_discovery_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ServerSettings {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
}

/// Session timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_lock_grace_ms")]
    pub lock_grace_ms: u64,
    #[serde(default = "default_approval_display_delay_ms")]
    pub approval_display_delay_ms: u64,
    #[serde(default = "default_fastest_overlay_ms")]
    pub fastest_overlay_ms: u64,
    #[serde(default = "default_go_wide_cap")]
    pub go_wide_cap: usize,
}

fn default_lock_grace_ms() -> u64 {
    1000
}
fn default_approval_display_delay_ms() -> u64 {
    2000
}
fn default_fastest_overlay_ms() -> u64 {
    5000
}
fn default_go_wide_cap() -> usize {
    2
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lock_grace_ms: default_lock_grace_ms(),
            approval_display_delay_ms: default_approval_display_delay_ms(),
            fastest_overlay_ms: default_fastest_overlay_ms(),
            go_wide_cap: default_go_wide_cap(),
        }
    }
}

impl TimingConfig {
    pub fn to_settings(&self) -> TimingSettings {
        TimingSettings {
            lock_grace: Duration::from_millis(self.lock_grace_ms),
            approval_display_delay: Duration::from_millis(self.approval_display_delay_ms),
            fastest_overlay: Duration::from_millis(self.fastest_overlay_ms),
            go_wide_cap: self.go_wide_cap,
        }
    }
}

/// Presence reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_duplicate_window_ms")]
    pub duplicate_window_ms: u64,
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_duplicate_window_ms() -> u64 {
    500
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            duplicate_window_ms: default_duplicate_window_ms(),
        }
    }
}

impl PresenceConfig {
    pub fn to_settings(&self) -> PresenceSettings {
        PresenceSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            duplicate_window: Duration::from_millis(self.duplicate_window_ms),
        }
    }
}

/// Player preferences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Team name to join with at startup. Empty = wait for user input.
    #[serde(default)]
    pub team_name: String,
    /// Team photo (any format the image crate reads). Empty = no photo.
    #[serde(default)]
    pub photo_path: String,
    /// Buzzer sound announced to the host after joining. Empty = host default.
    #[serde(default)]
    pub buzzer: String,
    /// Where the durable device id and cached team name live
    #[serde(default = "default_identity_file")]
    pub identity_file: String,
}

fn default_identity_file() -> String {
    "quizlink_identity.toml".to_string()
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            team_name: String::new(),
            photo_path: String::new(),
            buzzer: String::new(),
            identity_file: default_identity_file(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Write logs to stdout
    #[serde(default = "default_console")]
    pub console: bool,
    /// Log file path. Empty = no file logging.
    #[serde(default)]
    pub log_file: String,
}

fn default_console() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            console: default_console(),
            log_file: String::new(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

// =============================================================================
// CONFIG LOADING
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[source] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[source] toml::de::Error),
}

impl Config {
    pub const CONFIG_FILENAME: &'static str = "quizlink.toml";
    pub const CONFIG_ENV: &'static str = "QUIZLINK_CONFIG";

    /// Config path: `$QUIZLINK_CONFIG`, else `quizlink.toml` in the working directory
    pub fn default_path() -> PathBuf {
        std::env::var_os(Self::CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(Self::CONFIG_FILENAME))
    }

    /// Load from the default path and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::default_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "[config] Looking for config");

        if !path.exists() {
            debug!("[config] No config found, using defaults");
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&contents).map_err(ConfigError::ParseError)?;
        info!(path = %path.display(), "[config] Loaded config");
        Ok(config)
    }

    /// Apply `QUIZLINK_*` overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("QUIZLINK_WS_URL").filter(|v| !v.is_empty()) {
            debug!(url = %url, "[config] Static URL from environment");
            self.server.static_url = url;
        }
        if let Some(host) = lookup("QUIZLINK_HOST").filter(|v| !v.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("QUIZLINK_PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(_) => debug!(value = %port, "[config] Ignoring invalid QUIZLINK_PORT"),
            }
        }
        if let Some(secure) = lookup("QUIZLINK_SECURE") {
            self.server.secure = matches!(
                secure.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
