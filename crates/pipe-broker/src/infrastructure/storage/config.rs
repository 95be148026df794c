//! TOML configuration file for the broker.
//!
//! Every field is optional.  A file only needs the settings it changes:
//!
//! ```toml
//! [network]
//! port = 51000
//! socket_dir = "/run/vanilla"
//!
//! [wifi]
//! interface = "wlan1"
//! backend = "nmcli"
//! scan_timeout_secs = 8
//! target_ssid_prefix = "WiiU"
//!
//! [broker]
//! receive_timeout_ms = 1000
//! log_level = "debug"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so a partial (or empty) file
//! yields the same values as no file at all.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pipe_core::domain::transport::DEFAULT_SOCKET_DIR;
use pipe_core::{TransportMode, CMD_SERVER_PORT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    BrokerConfig, WifiBackendKind, DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SCAN_TIMEOUT,
    DEFAULT_SSID_PREFIX,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipeConfigFile {
    #[serde(default)]
    pub network: NetworkSection,
    #[serde(default)]
    pub wifi: WifiSection,
    #[serde(default)]
    pub broker: BrokerSection,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,
}

/// Wi-Fi capability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    /// Wireless interface name; absent means "let the backend choose".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub backend: WifiBackendKind,
    #[serde(default = "default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
    #[serde(default = "default_ssid_prefix")]
    pub target_ssid_prefix: String,
}

/// Event loop and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    CMD_SERVER_PORT
}
fn default_socket_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_DIR)
}
fn default_scan_timeout_secs() -> u64 {
    DEFAULT_SCAN_TIMEOUT.as_secs()
}
fn default_ssid_prefix() -> String {
    DEFAULT_SSID_PREFIX.to_string()
}
fn default_receive_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            socket_dir: default_socket_dir(),
        }
    }
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            interface: None,
            backend: WifiBackendKind::default(),
            scan_timeout_secs: default_scan_timeout_secs(),
            target_ssid_prefix: default_ssid_prefix(),
        }
    }
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            receive_timeout_ms: default_receive_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl PipeConfigFile {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed or a value has
    /// the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses the file at `path`.
    ///
    /// Unlike a settings store, a missing file is an error: the path was
    /// named explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Converts the file's settings into a [`BrokerConfig`] for `mode`.
    pub fn into_broker_config(self, mode: TransportMode) -> BrokerConfig {
        BrokerConfig {
            mode,
            port: self.network.port,
            socket_dir: self.network.socket_dir,
            interface: self.wifi.interface,
            wifi_backend: self.wifi.backend,
            scan_timeout: Duration::from_secs(self.wifi.scan_timeout_secs),
            receive_timeout: Duration::from_millis(self.broker.receive_timeout_ms),
            target_ssid_prefix: self.wifi.target_ssid_prefix,
            log_level: self.broker.log_level,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
