//! # pipe-core
//!
//! Shared library for the vanilla-pipe broker containing the command frame
//! types, the binary codec, and the session domain types.
//!
//! It has zero dependencies on OS APIs, Wi-Fi drivers, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! vanilla-pipe is a small helper process that sits between an emulator
//! frontend and a Wii U console.  The frontend cannot (or should not) touch
//! the Wi-Fi hardware itself, so it asks the broker to do it by sending short
//! binary commands over a local socket or UDP.
//!
//! This crate (`pipe-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How bytes travel between the frontend and the broker.
//!   Every frame starts with a one-byte control code followed by a fixed-size
//!   payload.  Numbers inside payloads are big-endian.
//!
//! - **`domain`** – The single session's state machine states and the
//!   transport mode / well-known address constants both sides agree on.

pub mod domain;
pub mod protocol;

pub use domain::session::SessionState;
pub use domain::transport::{TransportMode, CMD_SERVER_PORT};
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::frame::{Bssid, ConnectRequest, ControlCode, Frame, Psk, StatusCode};
