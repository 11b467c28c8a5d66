//! The message envelope carried over transport sessions.

use cloak_net_peers::NetworkPeer;
use cloak_net_primitives::MessageId;
use serde::{Deserialize, Serialize};

/// Discovery marker attached to an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Marker {
    DiscoveryRequest,
    DiscoveryResponse,
}

/// Envelope body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// A peer list, carried by discovery requests and responses.
    Peers(Vec<NetworkPeer>),
    /// Anything else, handed to the application untouched.
    Application(serde_json::Value),
}

/// Sender and recipient of an envelope.
///
/// On receipt the origination is rebuilt from the transport's sender
/// identity; whatever the sender wrote here is only a hint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default)]
    pub origination: Option<NetworkPeer>,
    #[serde(default)]
    pub destination: Option<NetworkPeer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    #[serde(default)]
    pub marker: Option<Marker>,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub route: Route,
}

impl Envelope {
    /// An unmarked envelope with a fresh id.
    pub fn new(payload: Option<Payload>) -> Self {
        Self {
            id: MessageId::random(),
            marker: None,
            payload,
            route: Route::default(),
        }
    }

    pub fn application(value: serde_json::Value) -> Self {
        Self::new(Some(Payload::Application(value)))
    }

    /// A discovery request with a fresh id carrying `peers`.
    pub fn discovery_request(
        origination: NetworkPeer,
        destination: NetworkPeer,
        peers: Vec<NetworkPeer>,
    ) -> Self {
        Self {
            id: MessageId::random(),
            marker: Some(Marker::DiscoveryRequest),
            payload: Some(Payload::Peers(peers)),
            route: Route {
                origination: Some(origination),
                destination: Some(destination),
            },
        }
    }

    /// A discovery response reusing the id of the request it answers.
    pub fn discovery_response(
        id: MessageId,
        origination: NetworkPeer,
        destination: NetworkPeer,
        peers: Vec<NetworkPeer>,
    ) -> Self {
        Self {
            id,
            marker: Some(Marker::DiscoveryResponse),
            payload: Some(Payload::Peers(peers)),
            route: Route {
                origination: Some(origination),
                destination: Some(destination),
            },
        }
    }

    pub fn with_destination(mut self, destination: NetworkPeer) -> Self {
        self.route.destination = Some(destination);
        self
    }

    pub fn destination(&self) -> Option<&NetworkPeer> {
        self.route.destination.as_ref()
    }

    pub fn origination(&self) -> Option<&NetworkPeer> {
        self.route.origination.as_ref()
    }

    /// Peer list carried by the payload, empty for anything else.
    pub fn peers(&self) -> &[NetworkPeer] {
        match &self.payload {
            Some(Payload::Peers(peers)) => peers,
            _ => &[],
        }
    }

    pub fn into_peers(self) -> Vec<NetworkPeer> {
        match self.payload {
            Some(Payload::Peers(peers)) => peers,
            _ => Vec::new(),
        }
    }

    pub fn is_discovery(&self) -> bool {
        self.marker.is_some()
    }
}
