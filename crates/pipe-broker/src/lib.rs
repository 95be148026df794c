//! vanilla-pipe broker library crate.
//!
//! The broker is a small privileged helper that sits between a Vanilla
//! frontend and the Wii U's Wi-Fi access point.  The frontend sends short
//! binary commands (SYNC, CONNECT, UNBIND, QUIT) to one well-known endpoint;
//! the broker performs the Wi-Fi work and replies to exactly the sender.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Frontend (binary frames over local socket or UDP)
//!         ↕
//! [pipe-broker]
//!   ├── domain/           BrokerConfig, WifiBackendKind
//!   ├── application/      Broker state machine, association worker, event loop
//!   └── infrastructure/
//!         ├── transport/  Local-domain / UDP datagram listener
//!         ├── wifi/       nmcli and mock Wi-Fi backends
//!         └── storage/    Optional TOML configuration file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O.
//! - `application` depends on `domain` and `pipe-core`, and reaches the OS
//!   only through the `FrameTransport` and `WifiCapability` traits.
//! - `infrastructure` implements those traits.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: command handling and the event loop.
pub mod application;

/// Infrastructure layer: sockets, Wi-Fi backends, config file.
pub mod infrastructure;
