//! Connectivity control for the overlay transport.
//!
//! [`classify`] maps a [`TransportStatus`](cloak_net_transport::TransportStatus)
//! to a [`ConnectivityState`]. [`StatusMonitor`] applies the
//! [`RestartPolicy`] on top: immediate restart when disconnected, restart
//! after a sustained block, and escalation from soft to hard restarts.

mod error;
mod monitor;
mod policy;
mod state;

pub use error::RestartError;
pub use monitor::{RecoveryHooks, StatusMonitor};
pub use policy::{
    BlockedDecision, DEFAULT_BLOCK_THRESHOLD, DEFAULT_HARD_RESTART_THRESHOLD, RestartKind,
    RestartPolicy, RestartPolicyConfig,
};
pub use state::{ConnectivityState, classify};
