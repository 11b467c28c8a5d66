//! Shared primitives for the cloak network crates.
//!
//! - [`NetworkTag`] - names the transport a peer is reachable over
//! - [`MessageId`] - correlates discovery requests with their responses
//! - [`Clock`] - injectable wall clock in milliseconds

mod clock;
mod message;
mod network;

pub use clock::{Clock, ManualClock, Millis, SystemClock};
pub use message::MessageId;
pub use network::{DEFAULT_NETWORK, NetworkTag};
