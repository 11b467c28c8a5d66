//! Peer records and the bounded peer directory.
//!
//! # Types
//!
//! - [`NetworkPeer`] - a peer on a named overlay, equal by network and fingerprint
//! - [`PeerDirectory`] - known peers plus the seed set used to bootstrap
//! - [`default_seeds`] - seeds shipped with the node

mod directory;
mod error;
mod peer;
mod seeds;

pub use directory::{AddOutcome, DEFAULT_MAX_PEERS, MergeSummary, PeerDirectory};
pub use error::DirectoryError;
pub use peer::{Fingerprint, NetworkPeer, PeerIdentity};
pub use seeds::default_seeds;
