//! The Wi-Fi capability the broker drives.
//!
//! Scanning, 802.11 association, key exchange, and DHCP all live behind
//! [`WifiCapability`].  The broker never talks to a driver directly; the
//! implementations are in `infrastructure::wifi`.

use std::net::IpAddr;
use std::time::Duration;

use pipe_core::ConnectRequest;
use thiserror::Error;

/// Error type for Wi-Fi capability operations.
#[derive(Debug, Error)]
pub enum WifiError {
    #[error("wireless interface not found: {0}")]
    InterfaceNotFound(String),
    #[error("no wireless interface available")]
    NoInterface,
    #[error("Wi-Fi capability not initialized")]
    NotInitialized,
    #[error("no target network found within {0:?}")]
    TargetNotFound(Duration),
    #[error("no SSID given and no target remembered from a previous sync")]
    NoTarget,
    #[error("association with {ssid} failed: {reason}")]
    AssociationFailed { ssid: String, reason: String },
    #[error("no network address obtained within {0:?}")]
    AddressTimeout(Duration),
    #[error("association cancelled")]
    Cancelled,
    #[error("platform error: {0}")]
    Platform(String),
}

/// Platform-agnostic Wi-Fi capability.
///
/// Methods take `&self` so one instance can be shared between the event loop
/// and the association worker thread; implementations use interior
/// mutability for whatever state they keep.
pub trait WifiCapability: Send + Sync {
    /// Prepares the given wireless interface, or the default one when `None`.
    fn init(&self, interface: Option<&str>) -> Result<(), WifiError>;

    /// Looks for the console's network and returns its SSID.
    ///
    /// Gives up with [`WifiError::TargetNotFound`] after `timeout`.
    fn scan_for_target(&self, timeout: Duration) -> Result<String, WifiError>;

    /// Joins the network described by `request`.  May block for a long time.
    fn associate(&self, request: &ConnectRequest) -> Result<(), WifiError>;

    /// Brings up addressing on the associated link (DHCP).
    fn configure_network(&self) -> Result<(), WifiError> {
        Ok(())
    }

    /// Leaves the current network, if any.
    fn disassociate(&self) -> Result<(), WifiError>;

    fn is_connected(&self) -> bool;

    fn current_ip_address(&self) -> Option<IpAddr>;

    /// Releases the interface.  Called once, after the listener is closed.
    fn cleanup(&self);
}
