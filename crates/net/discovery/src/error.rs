use cloak_net_transport::{CodecError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("discovery channel closed")]
    ChannelClosed,
}
