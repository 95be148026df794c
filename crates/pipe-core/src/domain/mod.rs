//! Domain layer: pure types describing the broker session and its transport.
//!
//! # Sub-modules
//!
//! - **`session`** – [`session::SessionState`], the single session's lifecycle
//!   states and which of them still accept commands.
//!
//! - **`transport`** – [`transport::TransportMode`] plus the well-known port
//!   and local socket path that the frontend and broker agree on.

pub mod session;
pub mod transport;
