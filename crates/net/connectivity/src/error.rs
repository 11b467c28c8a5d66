use std::time::Duration;

use cloak_net_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RestartError {
    /// The transport did not come back alive in time.
    #[error("transport not alive after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("restart aborted: {0}")]
    Aborted(String),
}
