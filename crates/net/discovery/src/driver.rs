//! Single owner task for discovery.
//!
//! Inbound datagrams and scheduled ticks arrive on one bounded channel and are
//! processed in order by [`run_discovery`].

use std::sync::Arc;

use cloak_net_primitives::Clock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::error::DiscoveryError;
use crate::protocol::{Discovery, InboundMessage};

/// Default capacity of the discovery input channel.
pub const DISCOVERY_CHANNEL_CAPACITY: usize = 1024;

/// Work item for the discovery owner task.
#[derive(Debug)]
pub enum DiscoveryInput {
    Inbound(InboundMessage),
    Tick,
}

/// Sender half of the discovery channel.
#[derive(Debug, Clone)]
pub struct DiscoveryHandle {
    tx: mpsc::Sender<DiscoveryInput>,
}

impl DiscoveryHandle {
    /// Queue an inbound datagram, waiting while the channel is full.
    pub async fn inbound(&self, message: InboundMessage) -> Result<(), DiscoveryError> {
        self.tx
            .send(DiscoveryInput::Inbound(message))
            .await
            .map_err(|_| DiscoveryError::ChannelClosed)
    }

    /// Request a tick. Dropped if one cannot be queued right now.
    pub fn tick(&self) -> Result<(), DiscoveryError> {
        match self.tx.try_send(DiscoveryInput::Tick) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("discovery channel full, dropping tick");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DiscoveryError::ChannelClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiver half of the discovery channel.
pub type DiscoveryReceiver = mpsc::Receiver<DiscoveryInput>;

pub fn discovery_channel(capacity: usize) -> (DiscoveryHandle, DiscoveryReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (DiscoveryHandle { tx }, rx)
}

/// Process discovery input until cancelled or every handle is dropped.
pub async fn run_discovery<C: Clock>(
    discovery: Arc<Discovery<C>>,
    mut rx: DiscoveryReceiver,
    shutdown: CancellationToken,
) {
    debug!("discovery task started");
    let mut handled = 0u64;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("discovery task received shutdown signal");
                break;
            }

            input = rx.recv() => {
                let Some(input) = input else {
                    debug!("discovery channel closed");
                    break;
                };
                handled += 1;

                match input {
                    DiscoveryInput::Tick => {
                        let outcome = discovery.tick().await;
                        trace!(?outcome, "discovery tick done");
                    }
                    DiscoveryInput::Inbound(message) => {
                        if let Err(err) = discovery.handle_inbound(message).await {
                            debug!(%err, "dropping inbound message");
                        }
                    }
                }
            }
        }
    }

    info!(handled, known = discovery.directory().count(), "discovery task stopped");
}
