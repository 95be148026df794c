//! Broker: the session state machine.
//!
//! Interprets each decoded frame against the current [`SessionState`], calls
//! the Wi-Fi capability, and returns the frame (if any) to send back.
//!
//! | Command    | Action                               | Next state   | Reply          |
//! |------------|--------------------------------------|--------------|----------------|
//! | SYNC       | scan for the console                 | unchanged    | STATUS         |
//! | CONNECT    | hand association to the worker       | `Connecting` | BIND_ACK       |
//! | UNBIND     | cancel attempt, disassociate         | `Idle`       | none           |
//! | QUIT       | cancel attempt                       | `ShuttingDown` | none         |
//! | other      | log                                  | unchanged    | none           |
//!
//! Once `ShuttingDown`, every frame is ignored.  [`Broker::shutdown`] also
//! joins any association worker still running, so the Wi-Fi capability is
//! idle by the time the caller cleans it up.

use std::sync::Arc;
use std::time::Duration;

use pipe_core::{decode_frame, ConnectRequest, Frame, SessionState, StatusCode};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::association::{AssociationHandle, AssociationOutcome, AssociationWorker};
use crate::application::wifi::WifiCapability;

/// Owns the single session and everything needed to move it between states.
pub struct Broker {
    wifi: Arc<dyn WifiCapability>,
    state: SessionState,
    /// SSID found by the last successful SYNC, consumed by the next CONNECT.
    target: Option<String>,
    worker: AssociationWorker,
    outcomes: mpsc::UnboundedReceiver<AssociationOutcome>,
    pending: Option<AssociationHandle>,
    scan_timeout: Duration,
}

impl Broker {
    /// Creates an `Idle` broker driving `wifi`.
    pub fn new(wifi: Arc<dyn WifiCapability>, scan_timeout: Duration) -> Self {
        let (worker, outcomes) = AssociationWorker::new(Arc::clone(&wifi));
        Self {
            wifi,
            state: SessionState::Idle,
            target: None,
            worker,
            outcomes,
            pending: None,
            scan_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The target remembered from the last successful SYNC.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.is_terminal()
    }

    /// Decodes a raw datagram and handles it.
    ///
    /// Undecodable input is inert: logged, no reply, no state change.
    pub fn handle_datagram(&mut self, bytes: &[u8]) -> Option<Frame> {
        match decode_frame(bytes) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => {
                let code = bytes.first().copied().unwrap_or_default();
                info!("ignoring command 0x{code:02x}: {e}");
                None
            }
        }
    }

    /// Applies one decoded frame and returns the reply to send, if any.
    pub fn handle_frame(&mut self, frame: Frame) -> Option<Frame> {
        if self.state.is_terminal() {
            debug!(?frame, "shutting down; frame ignored");
            return None;
        }

        debug!(code = frame.control_code() as u8, state = %self.state, "received command");

        match frame {
            Frame::Sync => Some(self.on_sync()),
            Frame::Connect(request) => Some(self.on_connect(request)),
            Frame::Unbind => {
                self.on_unbind();
                None
            }
            Frame::Quit => {
                self.on_quit();
                None
            }
            Frame::Status(_) | Frame::BindAck => {
                info!(
                    "ignoring response-only command 0x{:02x}",
                    frame.control_code() as u8
                );
                None
            }
        }
    }

    /// Applies every association outcome that has arrived so far.
    ///
    /// Returns how many outcomes changed the session state.
    pub fn poll_association(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(outcome) = self.outcomes.try_recv() {
            if self.apply_outcome(outcome) {
                applied += 1;
            }
        }
        applied
    }

    /// Moves to `ShuttingDown` and waits for every association worker.
    ///
    /// Safe to call after QUIT; the state is already terminal then and only
    /// the join runs.
    pub fn shutdown(&mut self) {
        if !self.state.is_terminal() {
            info!(from = %self.state, "shutdown requested");
            self.cancel_pending();
            self.state = SessionState::ShuttingDown;
        }
        self.worker.cancel_and_join();
    }

    // ── Transitions ───────────────────────────────────────────────────────────

    fn on_sync(&mut self) -> Frame {
        info!("sync requested; scanning for console");
        let resume = self.state;
        self.state = SessionState::Syncing;

        let result = self.wifi.scan_for_target(self.scan_timeout);
        self.state = resume;

        match result {
            Ok(ssid) => {
                info!(%ssid, "console network found");
                self.target = Some(ssid);
                Frame::Status(StatusCode::Success)
            }
            Err(e) => {
                warn!("sync failed: {e}");
                Frame::Status(StatusCode::GenericError)
            }
        }
    }

    fn on_connect(&mut self, mut request: ConnectRequest) -> Frame {
        info!(ssid = %request.ssid, bssid = %request.bssid, "connect requested");
        self.cancel_pending();

        if request.ssid.is_empty() {
            if let Some(ssid) = self.target.take() {
                request.ssid = ssid;
            }
        } else {
            self.target = None;
        }

        match self.worker.spawn(request) {
            Ok(handle) => {
                debug!(attempt = %handle.attempt(), "association handed off");
                self.pending = Some(handle);
                self.state = SessionState::Connecting;
            }
            Err(e) => {
                error!("failed to start association worker: {e}");
                self.state = SessionState::Idle;
            }
        }

        Frame::BindAck
    }

    fn on_unbind(&mut self) {
        info!(from = %self.state, "unbind requested");
        self.cancel_pending();
        self.target = None;
        if let Err(e) = self.wifi.disassociate() {
            warn!("disassociate failed: {e}");
        }
        self.state = SessionState::Idle;
    }

    fn on_quit(&mut self) {
        info!("quit requested");
        self.cancel_pending();
        self.state = SessionState::ShuttingDown;
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            debug!(attempt = %handle.attempt(), "cancelling association");
            handle.cancel();
        }
    }

    fn apply_outcome(&mut self, outcome: AssociationOutcome) -> bool {
        let current = self.pending.as_ref().map(AssociationHandle::attempt);
        if current != Some(outcome.attempt) || self.state != SessionState::Connecting {
            debug!(attempt = %outcome.attempt, "stale association outcome discarded");
            return false;
        }

        self.pending = None;
        match outcome.result {
            Ok(addr) => {
                info!(?addr, "bound to console");
                self.state = SessionState::Bound;
            }
            Err(e) => {
                warn!("association did not complete: {e}");
                self.state = SessionState::Idle;
            }
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
