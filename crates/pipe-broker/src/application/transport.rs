//! The datagram transport the event loop reads frames from.
//!
//! The concrete listener (local-domain or UDP socket) lives in
//! `infrastructure::transport`; tests substitute a scripted transport.

use std::fmt;
use std::path::PathBuf;

use pipe_core::TransportMode;
use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be bound.
    #[error("failed to bind {mode} endpoint {endpoint}: {source}")]
    BindFailed {
        mode: TransportMode,
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    /// A stale local socket file could not be removed before binding.
    #[error("failed to remove stale socket {path}: {source}")]
    StaleSocket {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// This platform has no implementation of the requested mode.
    #[error("{0} transport is not supported on this platform")]
    Unsupported(TransportMode),
    /// The peer has no address a reply can be sent to.
    #[error("peer {0} cannot be replied to")]
    UnaddressablePeer(String),
    /// The peer address belongs to the other transport mode.
    #[error("peer {peer} does not belong to the {mode} transport")]
    PeerModeMismatch { mode: TransportMode, peer: String },
    /// The listener has already been closed.
    #[error("transport is closed")]
    Closed,
    /// Any other socket I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one bounded receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received<P> {
    /// `len` bytes arrived from `peer`.
    Datagram { len: usize, peer: P },
    /// Nothing arrived within the receive timeout (or an empty datagram did).
    Timeout,
}

/// A bound datagram endpoint.
pub trait FrameTransport {
    /// Sender identity captured per datagram.
    type Peer: fmt::Display;

    /// Waits up to the configured timeout for one datagram, copying it into `buf`.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Received<Self::Peer>, TransportError>;

    /// Sends `bytes` to exactly `peer`.
    fn send(&mut self, bytes: &[u8], peer: &Self::Peer) -> Result<(), TransportError>;

    /// Stops accepting frames and releases the endpoint.  Idempotent.
    fn close(&mut self);
}
