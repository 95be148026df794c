//! Domain layer: broker-wide configuration types.
//!
//! Frame and session types live in `pipe-core`; this module holds only what
//! is specific to running the broker process.

pub mod config;

pub use config::{BrokerConfig, WifiBackendKind};
