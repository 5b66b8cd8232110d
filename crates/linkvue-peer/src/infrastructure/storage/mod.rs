//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the peer's TOML configuration from the
//! platform config directory, falls back to defaults on first run, and writes
//! it back on request.  Drawings themselves are never stored.

pub mod config;
