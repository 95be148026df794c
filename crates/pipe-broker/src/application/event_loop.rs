//! Event loop: owns the listener and drives the broker until shutdown.
//!
//! Each iteration:
//!
//! 1. Stop if the shutdown flag is set (SIGINT/SIGTERM) or the broker has
//!    entered `ShuttingDown` (QUIT).
//! 2. Apply any association outcomes the worker has reported.
//! 3. Wait up to the receive timeout for one datagram.
//! 4. Decode and dispatch it; send the reply, if any, to exactly its sender.
//!
//! The loop is single-threaded.  Shutdown latency is bounded by the receive
//! timeout (plus a SYNC scan, if one is running).
//!
//! On exit the broker joins any association worker, the listener is closed,
//! and only then is the Wi-Fi capability cleaned up.  Nothing touches the
//! radio after it has been released.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use pipe_core::encode_frame;
use pipe_core::protocol::frame::MAX_FRAME_SIZE;
use tracing::{debug, info, warn};

use crate::application::broker::Broker;
use crate::application::transport::{FrameTransport, Received};
use crate::application::wifi::WifiCapability;

/// Why [`EventLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The shutdown flag was raised from outside (a signal).
    Signal,
    /// The frontend sent QUIT.
    Quit,
}

/// What a single [`EventLoop::run_once`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Keep going.
    Continue,
    /// Stop for the given reason.
    Stop(ShutdownReason),
}

pub struct EventLoop<T: FrameTransport> {
    transport: T,
    broker: Broker,
    wifi: Arc<dyn WifiCapability>,
    shutdown: Arc<AtomicBool>,
}

impl<T: FrameTransport> EventLoop<T> {
    /// `shutdown` is the flag the signal handlers set; the loop also sets it
    /// when QUIT arrives.
    pub fn new(
        transport: T,
        broker: Broker,
        wifi: Arc<dyn WifiCapability>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            broker,
            wifi,
            shutdown,
        }
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Runs until shutdown, then joins workers, closes the listener and
    /// cleans up Wi-Fi.
    pub fn run(mut self) -> ShutdownReason {
        info!("event loop started");
        let reason = loop {
            if let Iteration::Stop(reason) = self.run_once() {
                break reason;
            }
        };

        self.broker.shutdown();
        self.transport.close();
        self.wifi.cleanup();
        info!(?reason, "event loop stopped");
        reason
    }

    /// Performs one bounded iteration of the loop.
    pub fn run_once(&mut self) -> Iteration {
        if self.broker.is_shutting_down() {
            return Iteration::Stop(ShutdownReason::Quit);
        }
        if self.shutdown.load(Ordering::Relaxed) {
            info!("shutdown signal received");
            return Iteration::Stop(ShutdownReason::Signal);
        }

        self.broker.poll_association();

        let mut buf = [0u8; MAX_FRAME_SIZE];
        let (len, peer) = match self.transport.receive(&mut buf) {
            Ok(Received::Datagram { len, peer }) => (len, peer),
            Ok(Received::Timeout) => return Iteration::Continue,
            Err(e) => {
                warn!("receive failed: {e}");
                return Iteration::Continue;
            }
        };
        debug!(%peer, len, "datagram received");

        if let Some(reply) = self.broker.handle_datagram(&buf[..len]) {
            match encode_frame(&reply) {
                Ok(bytes) => {
                    if let Err(e) = self.transport.send(&bytes, &peer) {
                        warn!(%peer, "failed to send reply: {e}");
                    }
                }
                Err(e) => warn!("failed to encode reply: {e}"),
            }
        }

        if self.broker.is_shutting_down() {
            self.shutdown.store(true, Ordering::Relaxed);
            return Iteration::Stop(ShutdownReason::Quit);
        }
        Iteration::Continue
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
