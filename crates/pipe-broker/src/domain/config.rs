//! Broker configuration types.
//!
//! [`BrokerConfig`] is the single source of truth for all runtime settings.
//! The binary assembles it from, in order of precedence, command-line
//! arguments, an optional TOML file, and the defaults below.
//!
//! Like the frame types, it is a plain struct: nothing in here reads the
//! environment or the file system.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pipe_core::domain::transport::DEFAULT_SOCKET_DIR;
use pipe_core::{TransportMode, CMD_SERVER_PORT};
use serde::{Deserialize, Serialize};

/// SSID prefix the console's access point is recognised by.
pub const DEFAULT_SSID_PREFIX: &str = "WiiU";

/// How long a SYNC scan may search before replying with an error.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive timeout of the listener; bounds shutdown latency.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Which Wi-Fi capability implementation drives the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiBackendKind {
    /// NetworkManager via the `nmcli` command (Linux).
    #[default]
    Nmcli,
    /// In-memory recording backend; never touches the hardware.
    Mock,
}

impl fmt::Display for WifiBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WifiBackendKind::Nmcli => f.write_str("nmcli"),
            WifiBackendKind::Mock => f.write_str("mock"),
        }
    }
}

impl FromStr for WifiBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nmcli" => Ok(WifiBackendKind::Nmcli),
            "mock" => Ok(WifiBackendKind::Mock),
            other => Err(format!("unknown Wi-Fi backend '{other}' (expected nmcli or mock)")),
        }
    }
}

/// All runtime configuration for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Local socket or UDP.  Fixed for the life of the process.
    pub mode: TransportMode,
    /// Command port; also names the local socket file.
    pub port: u16,
    /// Directory holding the local socket file.
    pub socket_dir: PathBuf,
    /// Wireless interface to use.  `None` lets the backend pick one.
    pub interface: Option<String>,
    pub wifi_backend: WifiBackendKind,
    pub scan_timeout: Duration,
    pub receive_timeout: Duration,
    pub target_ssid_prefix: String,
    /// `tracing` filter used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl BrokerConfig {
    /// Defaults for `mode`.
    ///
    /// | Field              | Default        |
    /// |--------------------|----------------|
    /// | port               | `51000`        |
    /// | socket_dir         | `/tmp`         |
    /// | interface          | none           |
    /// | wifi_backend       | `nmcli`        |
    /// | scan_timeout       | 5 seconds      |
    /// | receive_timeout    | 1 second       |
    /// | target_ssid_prefix | `WiiU`         |
    /// | log_level          | `info`         |
    pub fn with_mode(mode: TransportMode) -> Self {
        Self {
            mode,
            port: CMD_SERVER_PORT,
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            interface: None,
            wifi_backend: WifiBackendKind::default(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            target_ssid_prefix: DEFAULT_SSID_PREFIX.to_string(),
            log_level: "info".to_string(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
