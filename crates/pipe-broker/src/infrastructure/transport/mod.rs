//! Datagram listener: the one socket the broker receives frames on.
//!
//! Depending on the [`TransportMode`] chosen at startup the listener wraps
//! either a local-domain datagram socket or a UDP socket.  Both are
//! configured with a read timeout so `receive` returns
//! [`Received::Timeout`] on a steady cadence and the event loop can check
//! its shutdown flag.
//!
//! # Read timeout
//!
//! `recv_from` blocks for at most the configured timeout (1 second by
//! default).  Timeouts, `EINTR`, and zero-length datagrams all surface as
//! `Timeout`.  A send timeout of the same length keeps a stuck peer from
//! blocking the loop.

use std::fmt;
use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use pipe_core::domain::transport::{local_socket_path, remote_bind_addr};
use pipe_core::TransportMode;
use tracing::{debug, info, warn};

use crate::application::transport::{FrameTransport, Received, TransportError};

/// Sender of a received datagram.
#[derive(Debug, Clone)]
pub enum PeerAddress {
    /// Local-domain peer.  Unnamed sockets cannot be replied to.
    #[cfg(unix)]
    Local(std::os::unix::net::SocketAddr),
    /// UDP peer.
    Remote(SocketAddr),
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            PeerAddress::Local(addr) => match addr.as_pathname() {
                Some(path) => write!(f, "{}", path.display()),
                None => f.write_str("(unnamed)"),
            },
            PeerAddress::Remote(addr) => write!(f, "{addr}"),
        }
    }
}

enum Endpoint {
    #[cfg(unix)]
    Local {
        socket: std::os::unix::net::UnixDatagram,
        path: PathBuf,
    },
    Remote(UdpSocket),
}

/// A bound datagram endpoint for one transport mode.
pub struct DatagramListener {
    mode: TransportMode,
    endpoint: Option<Endpoint>,
}

impl DatagramListener {
    /// Binds the endpoint for `mode` on the well-known `port`.
    ///
    /// Local mode binds `<socket_dir>/vanilla-pipe-<port>`; remote mode binds
    /// UDP `0.0.0.0:<port>`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the endpoint cannot be bound.
    pub fn bind(
        mode: TransportMode,
        port: u16,
        socket_dir: &Path,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        match mode {
            TransportMode::Local => Self::bind_local(&local_socket_path(socket_dir, port), timeout),
            TransportMode::Remote => Self::bind_remote(remote_bind_addr(port), timeout),
        }
    }

    /// Binds a local-domain datagram socket at `path`, replacing a stale one.
    #[cfg(unix)]
    pub fn bind_local(path: &Path, timeout: Duration) -> Result<Self, TransportError> {
        use std::os::unix::net::UnixDatagram;

        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(TransportError::StaleSocket {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let bind_failed = |source| TransportError::BindFailed {
            mode: TransportMode::Local,
            endpoint: path.display().to_string(),
            source,
        };
        let socket = UnixDatagram::bind(path).map_err(bind_failed)?;
        socket.set_read_timeout(Some(timeout)).map_err(bind_failed)?;
        socket.set_write_timeout(Some(timeout)).map_err(bind_failed)?;

        info!(path = %path.display(), "listening on local socket");
        Ok(Self {
            mode: TransportMode::Local,
            endpoint: Some(Endpoint::Local {
                socket,
                path: path.to_path_buf(),
            }),
        })
    }

    #[cfg(not(unix))]
    pub fn bind_local(_path: &Path, _timeout: Duration) -> Result<Self, TransportError> {
        Err(TransportError::Unsupported(TransportMode::Local))
    }

    /// Binds a UDP socket at `addr`.
    pub fn bind_remote(addr: SocketAddr, timeout: Duration) -> Result<Self, TransportError> {
        let bind_failed = |source| TransportError::BindFailed {
            mode: TransportMode::Remote,
            endpoint: addr.to_string(),
            source,
        };
        let socket = UdpSocket::bind(addr).map_err(bind_failed)?;
        socket.set_read_timeout(Some(timeout)).map_err(bind_failed)?;
        socket.set_write_timeout(Some(timeout)).map_err(bind_failed)?;

        let local = socket.local_addr().unwrap_or(addr);
        info!(%local, "listening on UDP");
        Ok(Self {
            mode: TransportMode::Remote,
            endpoint: Some(Endpoint::Remote(socket)),
        })
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.endpoint.is_none()
    }

    /// The bound UDP address; `None` in local mode or once closed.
    pub fn udp_local_addr(&self) -> Option<SocketAddr> {
        match &self.endpoint {
            Some(Endpoint::Remote(socket)) => socket.local_addr().ok(),
            _ => None,
        }
    }
}

impl FrameTransport for DatagramListener {
    type Peer = PeerAddress;

    fn receive(&mut self, buf: &mut [u8]) -> Result<Received<PeerAddress>, TransportError> {
        let result = match self.endpoint.as_ref().ok_or(TransportError::Closed)? {
            #[cfg(unix)]
            Endpoint::Local { socket, .. } => socket
                .recv_from(buf)
                .map(|(len, addr)| (len, PeerAddress::Local(addr))),
            Endpoint::Remote(socket) => socket
                .recv_from(buf)
                .map(|(len, addr)| (len, PeerAddress::Remote(addr))),
        };

        match result {
            Ok((0, _)) => Ok(Received::Timeout),
            Ok((len, peer)) => Ok(Received::Datagram { len, peer }),
            Err(e) if is_timeout_error(&e) => Ok(Received::Timeout),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn send(&mut self, bytes: &[u8], peer: &PeerAddress) -> Result<(), TransportError> {
        let endpoint = self.endpoint.as_ref().ok_or(TransportError::Closed)?;
        match (endpoint, peer) {
            #[cfg(unix)]
            (Endpoint::Local { socket, .. }, PeerAddress::Local(addr)) => {
                let path = addr
                    .as_pathname()
                    .ok_or_else(|| TransportError::UnaddressablePeer(peer.to_string()))?;
                socket.send_to(bytes, path)?;
            }
            (Endpoint::Remote(socket), PeerAddress::Remote(addr)) => {
                socket.send_to(bytes, addr)?;
            }
            #[allow(unreachable_patterns)]
            _ => {
                return Err(TransportError::PeerModeMismatch {
                    mode: self.mode,
                    peer: peer.to_string(),
                })
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        match self.endpoint.take() {
            #[cfg(unix)]
            Some(Endpoint::Local { socket, path }) => {
                drop(socket);
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), "failed to remove socket file: {e}");
                    }
                }
                info!("local socket closed");
            }
            Some(Endpoint::Remote(socket)) => {
                drop(socket);
                info!("UDP socket closed");
            }
            None => {}
        }
    }
}

impl Drop for DatagramListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// Returns `true` for OS timeout / would-block / interrupted errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
