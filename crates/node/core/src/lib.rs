//! Node infrastructure shared by the cloak binaries.
//!
//! - [`args`] - CLI argument structs
//! - [`config`] - TOML configuration with CLI overrides
//! - [`logging`] - Logging initialization
//! - [`version`] - Version information

pub mod args;
pub mod config;
pub mod logging;
pub mod version;
