//! Version information for the Cloak node.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The short version information for Cloak.
pub const SHORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The git commit SHA, when provided at build time.
pub const GIT_SHA: &str = {
    match option_env!("CLOAK_GIT_SHA") {
        Some(sha) => sha,
        None => "unknown",
    }
};

/// The long version information for Cloak (lazy static for runtime access).
pub static LONG_VERSION: once_cell::sync::Lazy<String> =
    once_cell::sync::Lazy::new(|| format!("Version: {}\nCommit SHA: {}", VERSION, GIT_SHA));
