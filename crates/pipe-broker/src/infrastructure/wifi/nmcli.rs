//! Linux Wi-Fi capability backed by NetworkManager's `nmcli`.
//!
//! Every operation shells out to `nmcli` in terse mode (`-t`) and parses the
//! colon-separated output.  NetworkManager handles WPA key exchange and DHCP,
//! so `configure_network` only waits for an address to appear.
//!
//! The Wii U advertises an SSID beginning with `WiiU`; the prefix is
//! configurable for testing against other access points.

use std::net::IpAddr;
use std::process::Command;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use pipe_core::ConnectRequest;
use tracing::{debug, info, warn};

use crate::application::wifi::{WifiCapability, WifiError};

/// Pause between scan attempts while waiting for the console to appear.
const SCAN_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on one `nmcli device wifi connect`.  Shutdown waits for an
/// in-flight association, so this also bounds shutdown latency.
const ASSOCIATE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `configure_network` waits for DHCP to hand out an address.
const ADDRESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Wi-Fi capability that drives NetworkManager.
pub struct NmcliWifi {
    ssid_prefix: String,
    interface: Mutex<Option<String>>,
}

impl NmcliWifi {
    /// Creates a backend that looks for networks whose SSID starts with `ssid_prefix`.
    pub fn new(ssid_prefix: impl Into<String>) -> Self {
        Self {
            ssid_prefix: ssid_prefix.into(),
            interface: Mutex::new(None),
        }
    }

    fn interface(&self) -> Result<String, WifiError> {
        self.slot().clone().ok_or(WifiError::NotInitialized)
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.interface.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WifiCapability for NmcliWifi {
    fn init(&self, interface: Option<&str>) -> Result<(), WifiError> {
        let status = nmcli(&["-t", "-f", "DEVICE,TYPE", "device", "status"])?;
        let devices = parse_wifi_devices(&status);

        let chosen = match interface {
            Some(name) if devices.iter().any(|d| d == name) => name.to_string(),
            Some(name) => return Err(WifiError::InterfaceNotFound(name.to_string())),
            None => devices.into_iter().next().ok_or(WifiError::NoInterface)?,
        };

        info!(interface = %chosen, "using wireless interface");
        *self.slot() = Some(chosen);
        Ok(())
    }

    fn scan_for_target(&self, timeout: Duration) -> Result<String, WifiError> {
        let iface = self.interface()?;
        let deadline = Instant::now() + timeout;

        loop {
            // A rescan can be refused while one is already running; the
            // listing below still returns the cached results.
            let wait = timeout.as_secs().max(1).to_string();
            if let Err(e) = nmcli(&["--wait", &wait, "device", "wifi", "rescan", "ifname", &iface]) {
                debug!("rescan refused: {e}");
            }

            let listing = nmcli(&[
                "-t", "-f", "SSID", "device", "wifi", "list", "ifname", &iface, "--rescan", "no",
            ])?;
            if let Some(ssid) = pick_target(&listing, &self.ssid_prefix) {
                return Ok(ssid);
            }

            if Instant::now() + SCAN_RETRY_INTERVAL >= deadline {
                return Err(WifiError::TargetNotFound(timeout));
            }
            std::thread::sleep(SCAN_RETRY_INTERVAL);
        }
    }

    fn associate(&self, request: &ConnectRequest) -> Result<(), WifiError> {
        let iface = self.interface()?;
        let bssid = request.bssid.to_string();
        let psk = request.psk.to_hex();

        let wait = ASSOCIATE_TIMEOUT.as_secs().to_string();
        nmcli(&[
            "--wait", &wait, "device", "wifi", "connect", &request.ssid, "password", &psk, "bssid", &bssid,
            "ifname", &iface,
        ])
        .map(|_| ())
        .map_err(|e| WifiError::AssociationFailed {
            ssid: request.ssid.clone(),
            reason: e.to_string(),
        })
    }

    fn configure_network(&self) -> Result<(), WifiError> {
        let deadline = Instant::now() + ADDRESS_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(addr) = self.current_ip_address() {
                debug!(%addr, "address acquired");
                return Ok(());
            }
            std::thread::sleep(SCAN_RETRY_INTERVAL);
        }
        Err(WifiError::AddressTimeout(ADDRESS_TIMEOUT))
    }

    fn disassociate(&self) -> Result<(), WifiError> {
        let iface = self.interface()?;
        nmcli(&["device", "disconnect", &iface]).map(|_| ())
    }

    fn is_connected(&self) -> bool {
        let Ok(iface) = self.interface() else {
            return false;
        };
        match nmcli(&["-t", "-f", "DEVICE,STATE", "device", "status"]) {
            Ok(status) => device_state(&status, &iface).as_deref() == Some("connected"),
            Err(e) => {
                warn!("failed to query device state: {e}");
                false
            }
        }
    }

    fn current_ip_address(&self) -> Option<IpAddr> {
        let iface = self.interface().ok()?;
        let out = nmcli(&["-g", "IP4.ADDRESS", "device", "show", &iface]).ok()?;
        parse_ip4_address(&out)
    }

    fn cleanup(&self) {
        if self.is_connected() {
            if let Err(e) = self.disassociate() {
                warn!("failed to disconnect during cleanup: {e}");
            }
        }
        *self.slot() = None;
    }
}

/// Runs `nmcli` and returns its stdout, or its stderr as the error.
fn nmcli(args: &[&str]) -> Result<String, WifiError> {
    let output = Command::new("nmcli")
        .args(args)
        .output()
        .map_err(|e| WifiError::Platform(format!("failed to run nmcli: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WifiError::Platform(format!(
            "nmcli {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ── Output parsing ────────────────────────────────────────────────────────────

/// Splits one terse line on unescaped `:` and unescapes `\:` and `\\`.
fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ':' => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Names of Wi-Fi devices in `DEVICE,TYPE` output, in listing order.
fn parse_wifi_devices(status: &str) -> Vec<String> {
    status
        .lines()
        .map(split_terse)
        .filter(|f| f.len() >= 2 && f[1] == "wifi")
        .map(|mut f| f.swap_remove(0))
        .collect()
}

/// State column for `iface` in `DEVICE,STATE` output.
fn device_state(status: &str, iface: &str) -> Option<String> {
    status
        .lines()
        .map(split_terse)
        .find(|f| f.len() >= 2 && f[0] == iface)
        .map(|mut f| f.swap_remove(1))
}

/// First SSID in a terse `SSID` listing that starts with `prefix`.
fn pick_target(listing: &str, prefix: &str) -> Option<String> {
    listing
        .lines()
        .filter_map(|line| split_terse(line).into_iter().next())
        .find(|ssid| !ssid.is_empty() && ssid.starts_with(prefix))
}

/// First address in `IP4.ADDRESS` output (`192.168.1.11/24`, possibly `|`-joined).
fn parse_ip4_address(out: &str) -> Option<IpAddr> {
    out.lines()
        .flat_map(|line| line.split('|'))
        .filter_map(|entry| entry.trim().split('/').next())
        .find_map(|addr| addr.parse().ok())
}
