//! Background association worker.
//!
//! CONNECT is acknowledged immediately, but joining the console's network
//! takes seconds.  The worker runs that handshake on its own thread and
//! reports back over a channel the event loop drains once per iteration:
//!
//! ```text
//! Broker::handle_frame(CONNECT)
//!   └─ AssociationWorker::spawn(request)  -> AssociationHandle { attempt, cancel }
//!        thread: [link lock] associate -> configure_network -> AssociationOutcome
//! EventLoop::run_once
//!   └─ Broker::poll_association()  -> Connecting becomes Bound or Idle
//! ```
//!
//! Every hand-off gets a fresh attempt id.  Cancelling an attempt (UNBIND,
//! QUIT, or a newer CONNECT) sets its flag; the worker checks it between
//! steps, and the broker ignores any outcome whose id is not the current one.
//!
//! # One association at a time
//!
//! Workers hold a shared link lock for their whole sequence.  A superseded
//! worker that already associated drops its link while still holding the
//! lock, so the newer attempt only starts once the interface is released and
//! can never have its link torn down by an older one.
//!
//! # Shutdown
//!
//! [`AssociationWorker::cancel_and_join`] cancels every running thread and
//! waits for it, so no worker touches the Wi-Fi capability after cleanup.

use std::net::IpAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, PoisonError,
};
use std::thread::JoinHandle;

use pipe_core::ConnectRequest;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::wifi::{WifiCapability, WifiError};

/// Result of one association attempt, sent from the worker to the loop.
#[derive(Debug)]
pub struct AssociationOutcome {
    /// Which attempt this outcome belongs to.
    pub attempt: Uuid,
    /// The address obtained on success (if the capability reports one).
    pub result: Result<Option<IpAddr>, WifiError>,
}

/// Owner-side handle for one in-flight attempt.
#[derive(Debug, Clone)]
pub struct AssociationHandle {
    attempt: Uuid,
    cancel: Arc<AtomicBool>,
}

impl AssociationHandle {
    pub fn attempt(&self) -> Uuid {
        self.attempt
    }

    /// Asks the worker to stop at its next checkpoint.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

struct RunningAttempt {
    handle: AssociationHandle,
    thread: JoinHandle<()>,
}

/// Spawns association attempts against a shared Wi-Fi capability.
pub struct AssociationWorker {
    wifi: Arc<dyn WifiCapability>,
    tx: mpsc::UnboundedSender<AssociationOutcome>,
    link: Arc<Mutex<()>>,
    running: Vec<RunningAttempt>,
}

impl AssociationWorker {
    /// Creates a worker and the receiver its outcomes arrive on.
    ///
    /// The channel is unbounded so a worker never blocks on reporting while
    /// its owner is waiting in [`cancel_and_join`](Self::cancel_and_join).
    pub fn new(
        wifi: Arc<dyn WifiCapability>,
    ) -> (Self, mpsc::UnboundedReceiver<AssociationOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            wifi,
            tx,
            link: Arc::new(Mutex::new(())),
            running: Vec::new(),
        };
        (worker, rx)
    }

    /// Starts associating with `request` on a background thread.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn(&mut self, request: ConnectRequest) -> std::io::Result<AssociationHandle> {
        self.reap_finished();

        let handle = AssociationHandle {
            attempt: Uuid::new_v4(),
            cancel: Arc::new(AtomicBool::new(false)),
        };
        let attempt = handle.attempt;

        let wifi = Arc::clone(&self.wifi);
        let tx = self.tx.clone();
        let link = Arc::clone(&self.link);
        let cancel = Arc::clone(&handle.cancel);

        let thread = std::thread::Builder::new()
            .name("pipe-associate".to_string())
            .spawn(move || {
                let result = {
                    let _link = link.lock().unwrap_or_else(PoisonError::into_inner);
                    run_association(wifi.as_ref(), &request, &cancel)
                };
                match &result {
                    Ok(addr) => info!(%attempt, ssid = %request.ssid, ?addr, "association complete"),
                    Err(WifiError::Cancelled) => debug!(%attempt, "association cancelled"),
                    Err(e) => warn!(%attempt, ssid = %request.ssid, "association failed: {e}"),
                }
                if tx.send(AssociationOutcome { attempt, result }).is_err() {
                    // Receiver dropped – the broker has already shut down.
                    debug!(%attempt, "association outcome dropped");
                }
            })?;

        self.running.push(RunningAttempt {
            handle: handle.clone(),
            thread,
        });
        Ok(handle)
    }

    /// Number of worker threads that have not been joined yet.
    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Cancels every running attempt and waits for its thread to exit.
    pub fn cancel_and_join(&mut self) {
        for running in &self.running {
            running.handle.cancel();
        }
        for running in self.running.drain(..) {
            let attempt = running.handle.attempt;
            if running.thread.join().is_err() {
                warn!(%attempt, "association worker panicked");
            } else {
                debug!(%attempt, "association worker joined");
            }
        }
    }

    fn reap_finished(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.running)
            .into_iter()
            .partition(|r| r.thread.is_finished());
        self.running = running;
        for done in finished {
            if done.thread.join().is_err() {
                warn!(attempt = %done.handle.attempt, "association worker panicked");
            }
        }
    }
}

impl Drop for AssociationWorker {
    fn drop(&mut self) {
        self.cancel_and_join();
    }
}

/// The blocking association sequence executed on the worker thread.
///
/// Callers hold the link lock, so a cancelled attempt that already
/// associated can only be dropping its own link here.
fn run_association(
    wifi: &dyn WifiCapability,
    request: &ConnectRequest,
    cancel: &AtomicBool,
) -> Result<Option<IpAddr>, WifiError> {
    if request.ssid.is_empty() {
        return Err(WifiError::NoTarget);
    }
    checkpoint(cancel)?;

    debug!(ssid = %request.ssid, bssid = %request.bssid, "associating");
    wifi.associate(request)?;

    if cancel.load(Ordering::Relaxed) {
        return drop_link(wifi);
    }

    wifi.configure_network()?;
    if cancel.load(Ordering::Relaxed) {
        return drop_link(wifi);
    }

    Ok(wifi.current_ip_address())
}

/// Takes down a link that came up after the owner gave up on it.
fn drop_link(wifi: &dyn WifiCapability) -> Result<Option<IpAddr>, WifiError> {
    if let Err(e) = wifi.disassociate() {
        warn!("failed to drop link after cancellation: {e}");
    }
    Err(WifiError::Cancelled)
}

fn checkpoint(cancel: &AtomicBool) -> Result<(), WifiError> {
    if cancel.load(Ordering::Relaxed) {
        Err(WifiError::Cancelled)
    } else {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::wifi::mock::{MockWifi, WifiCall};
    use pipe_core::{Bssid, Psk};
    use std::sync::Barrier;
    use std::time::Duration;

    fn request(ssid: &str) -> ConnectRequest {
        ConnectRequest {
            ssid: ssid.to_string(),
            bssid: Bssid([1, 2, 3, 4, 5, 6]),
            psk: Psk([9; 32]),
        }
    }

    fn recv_outcome(rx: &mut mpsc::UnboundedReceiver<AssociationOutcome>) -> AssociationOutcome {
        rx.blocking_recv().expect("worker must report an outcome")
    }

    #[test]
    fn test_successful_attempt_reports_address() {
        // Arrange
        let wifi = Arc::new(MockWifi::new());
        let (mut worker, mut rx) = AssociationWorker::new(wifi.clone());

        // Act
        let handle = worker.spawn(request("WiiU-test")).unwrap();
        let outcome = recv_outcome(&mut rx);

        // Assert
        assert_eq!(outcome.attempt, handle.attempt());
        assert!(outcome.result.unwrap().is_some());
        assert_eq!(
            wifi.calls(),
            vec![
                WifiCall::Associate(request("WiiU-test")),
                WifiCall::ConfigureNetwork
            ]
        );
    }

    #[test]
    fn test_empty_ssid_fails_without_touching_wifi() {
        let wifi = Arc::new(MockWifi::new());
        let (mut worker, mut rx) = AssociationWorker::new(wifi.clone());

        worker.spawn(request("")).unwrap();
        let outcome = recv_outcome(&mut rx);

        assert!(matches!(outcome.result, Err(WifiError::NoTarget)));
        assert!(wifi.calls().is_empty());
    }

    #[test]
    fn test_association_failure_is_reported() {
        let wifi = Arc::new(MockWifi::new().failing_association());
        let (mut worker, mut rx) = AssociationWorker::new(wifi);

        worker.spawn(request("WiiU-test")).unwrap();
        let outcome = recv_outcome(&mut rx);

        assert!(matches!(
            outcome.result,
            Err(WifiError::AssociationFailed { .. })
        ));
    }

    #[test]
    fn test_cancel_during_association_drops_the_link() {
        // Arrange: the gate holds `associate` open until the cancel is in.
        let gate = Arc::new(Barrier::new(2));
        let wifi = Arc::new(MockWifi::new().with_association_gate(gate.clone()));
        let (mut worker, mut rx) = AssociationWorker::new(wifi.clone());

        // Act
        let handle = worker.spawn(request("WiiU-test")).unwrap();
        gate.wait();
        handle.cancel();
        gate.wait();
        let outcome = recv_outcome(&mut rx);

        // Assert
        assert!(matches!(outcome.result, Err(WifiError::Cancelled)));
        assert!(!wifi.is_connected());
        assert_eq!(
            wifi.calls(),
            vec![
                WifiCall::Associate(request("WiiU-test")),
                WifiCall::Disassociate
            ]
        );
    }

    #[test]
    fn test_each_spawn_gets_a_fresh_attempt_id() {
        let wifi = Arc::new(MockWifi::new());
        let (mut worker, mut rx) = AssociationWorker::new(wifi);

        let a = worker.spawn(request("WiiU-a")).unwrap();
        let b = worker.spawn(request("WiiU-b")).unwrap();
        let _ = recv_outcome(&mut rx);
        let _ = recv_outcome(&mut rx);

        assert_ne!(a.attempt(), b.attempt());
    }

    #[test]
    fn test_superseded_attempt_does_not_drop_the_newer_link() {
        // Arrange
        let wifi = Arc::new(
            MockWifi::new()
                .with_ssid_delay("WiiU-slow", Duration::from_millis(300))
                .with_ssid_delay("WiiU-fast", Duration::from_millis(10)),
        );
        let (mut worker, mut rx) = AssociationWorker::new(wifi.clone());

        // Act: the newer attempt arrives while the older one is associating.
        let slow = worker.spawn(request("WiiU-slow")).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        slow.cancel();
        let fast = worker.spawn(request("WiiU-fast")).unwrap();
        let first = recv_outcome(&mut rx);
        let second = recv_outcome(&mut rx);
        std::thread::sleep(Duration::from_millis(100));

        // Assert
        assert_eq!(first.attempt, slow.attempt());
        assert!(matches!(first.result, Err(WifiError::Cancelled)));
        assert_eq!(second.attempt, fast.attempt());
        assert!(second.result.unwrap().is_some());
        assert!(wifi.is_connected());
        assert_eq!(wifi.peak_concurrent_associations(), 1);
        assert_eq!(
            wifi.calls().last(),
            Some(&WifiCall::ConfigureNetwork),
            "nothing may follow the newer attempt's setup"
        );
    }

    #[test]
    fn test_cancel_and_join_waits_for_in_flight_worker() {
        // Arrange
        let wifi = Arc::new(MockWifi::new().with_association_delay(Duration::from_millis(200)));
        let (mut worker, _rx) = AssociationWorker::new(wifi.clone());
        worker.spawn(request("WiiU-test")).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // Act
        worker.cancel_and_join();
        let calls_after_join = wifi.calls();
        std::thread::sleep(Duration::from_millis(300));

        // Assert
        assert_eq!(worker.running(), 0);
        assert_eq!(
            calls_after_join,
            vec![
                WifiCall::Associate(request("WiiU-test")),
                WifiCall::Disassociate
            ]
        );
        assert_eq!(wifi.calls(), calls_after_join, "no calls after join");
        assert!(!wifi.is_connected());
    }

    #[test]
    fn test_finished_workers_are_reaped_on_next_spawn() {
        let wifi = Arc::new(MockWifi::new());
        let (mut worker, mut rx) = AssociationWorker::new(wifi);

        worker.spawn(request("WiiU-a")).unwrap();
        let _ = recv_outcome(&mut rx);
        std::thread::sleep(Duration::from_millis(50));
        worker.spawn(request("WiiU-b")).unwrap();

        assert_eq!(worker.running(), 1);
        worker.cancel_and_join();
    }
}
