//! Peer identity records exchanged over the overlay.

use std::fmt;
use std::hash::{Hash, Hasher};

use cloak_net_primitives::NetworkTag;
use serde::{Deserialize, Serialize};

/// Stable hash of a peer's public key, as reported by the transport.
///
/// The primary key of the peer directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(fingerprint: impl Into<String>) -> Self {
        Self(fingerprint.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First seven characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..7).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Key and reachability block of a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerIdentity {
    /// Transport-specific reachability token (opaque to this crate).
    #[serde(default)]
    pub address: String,
    pub fingerprint: Fingerprint,
    #[serde(default)]
    pub key_type: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub verified: bool,
}

/// A peer reachable over a given network.
///
/// Two records with the same network and fingerprint are the same peer,
/// whatever their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPeer {
    #[serde(default)]
    id: String,
    network: NetworkTag,
    #[serde(rename = "did")]
    identity: PeerIdentity,
}

impl NetworkPeer {
    pub fn new(
        network: NetworkTag,
        address: impl Into<String>,
        fingerprint: impl Into<Fingerprint>,
    ) -> Self {
        Self {
            id: String::new(),
            network,
            identity: PeerIdentity {
                address: address.into(),
                fingerprint: fingerprint.into(),
                ..Default::default()
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_key_type(mut self, key_type: impl Into<String>) -> Self {
        self.identity.key_type = key_type.into();
        self
    }

    /// Replace address and fingerprint with what the transport observed for the sender.
    ///
    /// Anything a peer claims about itself in application data is overwritten here.
    pub fn with_sender_identity(
        mut self,
        address: impl Into<String>,
        fingerprint: impl Into<Fingerprint>,
    ) -> Self {
        self.identity.address = address.into();
        self.identity.fingerprint = fingerprint.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn network(&self) -> &NetworkTag {
        &self.network
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.identity.fingerprint
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// A record without a fingerprint cannot be deduplicated and is never stored.
    pub fn is_valid(&self) -> bool {
        !self.identity.fingerprint.is_empty()
    }
}

impl PartialEq for NetworkPeer {
    fn eq(&self, other: &Self) -> bool {
        self.network == other.network && self.identity.fingerprint == other.identity.fingerprint
    }
}

impl Eq for NetworkPeer {}

impl Hash for NetworkPeer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.network.hash(state);
        self.identity.fingerprint.hash(state);
    }
}

impl fmt::Display for NetworkPeer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.identity.fingerprint.short())
    }
}
