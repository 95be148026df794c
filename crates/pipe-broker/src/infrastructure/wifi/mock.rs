//! Mock Wi-Fi capability for tests and hardware-free runs.
//!
//! # Why a mock Wi-Fi backend?
//!
//! The real backend changes the machine's wireless connection, needs a Wii U
//! in range, and usually needs root.  `MockWifi` replaces all of that with
//! in-memory recording: every call is pushed onto a `Mutex<Vec<WifiCall>>`
//! so assertions can check exactly what the broker asked for and in which
//! order.
//!
//! It is also selectable at runtime (`--wifi-backend mock`) so a frontend
//! can be developed against the broker without a console.
//!
//! # Usage in tests
//!
//! ```ignore
//! let wifi = Arc::new(MockWifi::new().with_target("WiiU1234"));
//! let mut broker = Broker::new(wifi.clone(), Duration::from_secs(3));
//!
//! broker.handle_frame(Frame::Unbind);
//! assert_eq!(wifi.count(|c| matches!(c, WifiCall::Disassociate)), 1);
//! ```

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Barrier, Mutex,
};
use std::time::Duration;

use pipe_core::ConnectRequest;

use crate::application::wifi::{WifiCapability, WifiError};

/// SSID the mock "finds" unless configured otherwise.
pub const DEFAULT_MOCK_TARGET: &str = "WiiU0000mock";

/// Address reported while the mock is associated.
const MOCK_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 11));

/// One recorded call on [`MockWifi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiCall {
    Init(Option<String>),
    Scan(Duration),
    Associate(ConnectRequest),
    ConfigureNetwork,
    Disassociate,
    Cleanup,
}

/// A Wi-Fi capability that records calls instead of touching hardware.
pub struct MockWifi {
    calls: Mutex<Vec<WifiCall>>,
    connected: AtomicBool,
    target: Option<String>,
    association_delay: Duration,
    ssid_delays: Vec<(String, Duration)>,
    association_gate: Option<Arc<Barrier>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    fail_init: bool,
    fail_association: bool,
    fail_disassociate: bool,
}

impl Default for MockWifi {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            target: Some(DEFAULT_MOCK_TARGET.to_string()),
            association_delay: Duration::ZERO,
            ssid_delays: Vec::new(),
            association_gate: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            fail_init: false,
            fail_association: false,
            fail_disassociate: false,
        }
    }
}

impl MockWifi {
    /// A mock that finds [`DEFAULT_MOCK_TARGET`] and whose calls all succeed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans report `ssid`.
    pub fn with_target(mut self, ssid: &str) -> Self {
        self.target = Some(ssid.to_string());
        self
    }

    /// Scans find nothing.
    pub fn without_target(mut self) -> Self {
        self.target = None;
        self
    }

    /// `associate` sleeps this long before returning.
    pub fn with_association_delay(mut self, delay: Duration) -> Self {
        self.association_delay = delay;
        self
    }

    /// `associate` sleeps `delay` instead when asked for `ssid`.
    pub fn with_ssid_delay(mut self, ssid: &str, delay: Duration) -> Self {
        self.ssid_delays.push((ssid.to_string(), delay));
        self
    }

    /// `associate` waits on `gate` twice: once on entry and once before
    /// returning.  The other party can act between the two waits while the
    /// call is known to be in flight.
    pub fn with_association_gate(mut self, gate: Arc<Barrier>) -> Self {
        self.association_gate = Some(gate);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_association(mut self) -> Self {
        self.fail_association = true;
        self
    }

    pub fn failing_disassociate(mut self) -> Self {
        self.fail_disassociate = true;
        self
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<WifiCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&WifiCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Most `associate` calls ever observed running at the same time.
    pub fn peak_concurrent_associations(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn association_delay_for(&self, ssid: &str) -> Duration {
        self.ssid_delays
            .iter()
            .find(|(s, _)| s == ssid)
            .map_or(self.association_delay, |(_, d)| *d)
    }

    fn record(&self, call: WifiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl WifiCapability for MockWifi {
    fn init(&self, interface: Option<&str>) -> Result<(), WifiError> {
        self.record(WifiCall::Init(interface.map(str::to_string)));
        if self.fail_init {
            return Err(WifiError::InterfaceNotFound(
                interface.unwrap_or("default").to_string(),
            ));
        }
        Ok(())
    }

    fn scan_for_target(&self, timeout: Duration) -> Result<String, WifiError> {
        self.record(WifiCall::Scan(timeout));
        self.target.clone().ok_or(WifiError::TargetNotFound(timeout))
    }

    fn associate(&self, request: &ConnectRequest) -> Result<(), WifiError> {
        self.record(WifiCall::Associate(request.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(gate) = &self.association_gate {
            gate.wait();
            gate.wait();
        }
        let delay = self.association_delay_for(&request.ssid);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_association {
            return Err(WifiError::AssociationFailed {
                ssid: request.ssid.clone(),
                reason: "mock failure".into(),
            });
        }
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn configure_network(&self) -> Result<(), WifiError> {
        self.record(WifiCall::ConfigureNetwork);
        Ok(())
    }

    fn disassociate(&self) -> Result<(), WifiError> {
        self.record(WifiCall::Disassociate);
        if self.fail_disassociate {
            return Err(WifiError::Platform("mock failure".into()));
        }
        self.connected.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn current_ip_address(&self) -> Option<IpAddr> {
        self.is_connected().then_some(MOCK_ADDRESS)
    }

    fn cleanup(&self) {
        self.record(WifiCall::Cleanup);
        self.connected.store(false, Ordering::Relaxed);
    }
}
