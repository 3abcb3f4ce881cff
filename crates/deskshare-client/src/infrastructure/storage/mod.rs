//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the client's TOML configuration from the
//! platform config directory, falls back to defaults on first run, and can
//! write a configuration back to disk.

pub mod config;
