//! CLI argument structs for node configuration.
//!
//! These args serve dual purposes:
//! - CLI parsing via clap (`#[derive(Args)]`)
//! - Overrides applied on top of the TOML configuration

mod datadir;
mod log;
mod network;

pub use datadir::DataDirArgs;
pub use log::LogArgs;
pub use network::{NetworkArgs, parse_seed};
