//! Application layer for the vanilla-pipe broker.
//!
//! The application layer knows *what* the broker does with each command, but
//! delegates *how* sockets and radios work to the infrastructure layer
//! through two traits: [`FrameTransport`] and [`WifiCapability`].
//!
//! # What does NOT belong here?
//!
//! - Opening sockets (that is `infrastructure::transport`)
//! - Running `nmcli` or any other platform tool (`infrastructure::wifi`)
//! - Reading configuration files (`infrastructure::storage`)

pub mod association;
pub mod broker;
pub mod event_loop;
pub mod transport;
pub mod wifi;

pub use broker::Broker;
pub use event_loop::{EventLoop, Iteration, ShutdownReason};
pub use transport::{FrameTransport, Received, TransportError};
pub use wifi::{WifiCapability, WifiError};
