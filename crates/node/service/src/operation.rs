//! Operations served by the network service.

use cloak_net_connectivity::{ConnectivityState, RestartKind};
use cloak_net_peers::NetworkPeer;
use cloak_net_transport::Envelope;

/// A request addressed to the network service.
#[derive(Debug, Clone, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    /// Send an envelope to its destination.
    Send(Envelope),
    /// Poll the transport status now.
    CheckStatus,
    ActivePeersCount,
    KnownPeersCount,
    LocalPeer,
    /// Change a transport setting, restarting if the persisted value changed.
    UpdateSetting { key: String, value: String },
    /// Anything else; answered with [`OperationOutcome::DeadLetter`].
    Other { name: String },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Answer to an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Sent,
    Status(ConnectivityState),
    Count(usize),
    LocalPeer(Option<NetworkPeer>),
    SettingUpdated {
        changed: bool,
        restart: Option<RestartKind>,
    },
    /// The operation is not served here.
    DeadLetter { name: String },
}
