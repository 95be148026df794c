//! Transport mode and the well-known addresses both sides agree on.
//!
//! The broker listens on exactly one endpoint for its whole lifetime:
//!
//! - `Local`: a datagram socket at `<socket_dir>/vanilla-pipe-<port>`, for a
//!   frontend on the same machine.
//! - `Remote`: UDP on `0.0.0.0:<port>`, for a frontend elsewhere on the LAN.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Well-known command port.  Also embedded in the local socket file name.
pub const CMD_SERVER_PORT: u16 = 51000;

/// Directory that holds the local socket unless configured otherwise.
pub const DEFAULT_SOCKET_DIR: &str = "/tmp";

/// Which kind of endpoint the broker listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Local-domain datagram socket (same-host IPC).
    Local,
    /// UDP socket reachable from the network.
    Remote,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Local => f.write_str("local"),
            TransportMode::Remote => f.write_str("udp"),
        }
    }
}

/// Path of the local socket for `port` inside `dir`.
///
/// ```rust
/// use pipe_core::domain::transport::local_socket_path;
///
/// let path = local_socket_path("/tmp".as_ref(), 51000);
/// assert_eq!(path.to_str(), Some("/tmp/vanilla-pipe-51000"));
/// ```
pub fn local_socket_path(dir: &Path, port: u16) -> PathBuf {
    dir.join(format!("vanilla-pipe-{port}"))
}

/// Wildcard UDP bind address for `port`.
pub fn remote_bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}
