use cloak_net_peers::Fingerprint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty envelope")]
    Empty,
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// The session was closed underneath the caller.
    #[error("session already closed")]
    SessionClosed,
    #[error("session not connected")]
    NotConnected,
    #[error("transport not running")]
    NotRunning,
    #[error("destination not found: {0}")]
    DestinationNotFound(Fingerprint),
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Other(String),
}
