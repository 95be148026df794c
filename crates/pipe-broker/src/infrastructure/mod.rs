//! Infrastructure layer: everything that touches the OS.
//!
//! - `transport` – the local-domain / UDP datagram listener.
//! - `wifi` – Wi-Fi capability backends (`nmcli`, mock).
//! - `storage` – the optional TOML configuration file.

pub mod storage;
pub mod transport;
pub mod wifi;
