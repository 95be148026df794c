//! Storage infrastructure: the optional TOML configuration file.
//!
//! The broker never writes configuration back; it only reads the file named
//! by `--config` (or `VANILLA_PIPE_CONFIG`) at startup.

pub mod config;
