//! Peer discovery over the overlay.
//!
//! Every tick, while connected and below capacity, the node sends a
//! `discovery-request` carrying its known peers, to every seed when it knows
//! nobody, otherwise to one random known peer. Receivers merge the list and
//! answer with their own under the same message id. Outstanding requests are
//! tracked in an [`InFlightTracker`] and swept on the next tick.

mod driver;
mod error;
mod inflight;
mod protocol;

pub use driver::{
    DISCOVERY_CHANNEL_CAPACITY, DiscoveryHandle, DiscoveryInput, DiscoveryReceiver,
    discovery_channel, run_discovery,
};
pub use error::DiscoveryError;
pub use inflight::InFlightTracker;
pub use protocol::{
    Discovery, InboundMessage, InboundOutcome, MessageBus, Outbound, SkipReason, TickOutcome,
};
