//! Wi-Fi capability implementations.
//!
//! The NetworkManager backend is compiled only on Linux.  `MockWifi` is
//! available everywhere, for tests and for running without a console.

use std::sync::Arc;

use tracing::warn;

use crate::application::wifi::{WifiCapability, WifiError};
use crate::domain::config::WifiBackendKind;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod nmcli;

/// Builds the backend selected by configuration.
///
/// # Errors
///
/// Returns [`WifiError::Platform`] if the backend does not exist on this platform.
pub fn build_backend(
    kind: WifiBackendKind,
    ssid_prefix: &str,
) -> Result<Arc<dyn WifiCapability>, WifiError> {
    match kind {
        WifiBackendKind::Mock => {
            warn!("using the mock Wi-Fi backend; no real connection will be made");
            Ok(Arc::new(mock::MockWifi::new()))
        }
        #[cfg(target_os = "linux")]
        WifiBackendKind::Nmcli => Ok(Arc::new(nmcli::NmcliWifi::new(ssid_prefix))),
        #[cfg(not(target_os = "linux"))]
        WifiBackendKind::Nmcli => {
            let _ = ssid_prefix;
            Err(WifiError::Platform(
                "the nmcli backend is only available on Linux".to_string(),
            ))
        }
    }
}
