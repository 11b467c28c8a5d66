use cloak_net_connectivity::RestartError;
use cloak_net_primitives::NetworkTag;
use cloak_net_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Outbound envelope without a destination.
    #[error("envelope has no destination")]
    DestinationRequired,

    #[error("destination is on network {actual}, expected {expected}")]
    WrongNetwork {
        expected: NetworkTag,
        actual: NetworkTag,
    },

    #[error("service not started")]
    NotStarted,

    #[error("service already started")]
    AlreadyStarted,

    /// The transport came up without a local identity.
    #[error("transport reported no local peer")]
    NoLocalPeer,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Restart(#[from] RestartError),
}

impl ServiceError {
    /// Collapse into a transport error for callers that only speak [`TransportError`].
    pub fn into_transport(self) -> TransportError {
        match self {
            Self::Transport(err) => err,
            other => TransportError::Other(other.to_string()),
        }
    }
}
