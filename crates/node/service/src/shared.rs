//! Transport-facing state shared by the service, its tasks and the monitor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloak_net_connectivity::{RecoveryHooks, RestartError, StatusMonitor};
use cloak_net_discovery::{InFlightTracker, Outbound};
use cloak_net_peers::{NetworkPeer, PeerDirectory};
use cloak_net_primitives::Clock;
use cloak_net_transport::{Envelope, TransportError, TransportProvider};
use cloak_tasks::TaskRunner;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::sessions::{DEFAULT_SESSION, SessionCache};

pub(crate) struct ServiceCore<T> {
    pub(crate) transport: Arc<T>,
    pub(crate) local: NetworkPeer,
    pub(crate) sessions: SessionCache,
    pub(crate) directory: Arc<PeerDirectory>,
    pub(crate) tracker: Arc<InFlightTracker>,
    pub(crate) runner: Arc<TaskRunner>,
    pub(crate) soft_restart_timeout: Duration,
    pub(crate) soft_restart_poll: Duration,
}

impl<T: TransportProvider> ServiceCore<T> {
    /// Validate and send over the default session.
    pub(crate) async fn send_out(&self, envelope: &Envelope) -> Result<(), ServiceError> {
        let destination = envelope
            .destination()
            .ok_or(ServiceError::DestinationRequired)?;

        let expected = self.transport.network();
        if destination.network() != expected {
            return Err(ServiceError::WrongNetwork {
                expected: expected.clone(),
                actual: destination.network().clone(),
            });
        }

        let session = self
            .sessions
            .get_or_open(self.transport.as_ref(), DEFAULT_SESSION)
            .await?;

        match session.send(envelope).await {
            Ok(()) => Ok(()),
            Err(TransportError::SessionClosed) => {
                self.sessions.evict(DEFAULT_SESSION);
                Err(TransportError::SessionClosed.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn wait_alive(&self) -> Result<(), RestartError> {
        let poll = async {
            while !self.transport.is_alive() {
                debug!("waiting for transport to come back");
                tokio::time::sleep(self.soft_restart_poll).await;
            }
        };

        tokio::time::timeout(self.soft_restart_timeout, poll)
            .await
            .map_err(|_| RestartError::Timeout(self.soft_restart_timeout))
    }
}

#[async_trait]
impl<T: TransportProvider> RecoveryHooks for ServiceCore<T> {
    async fn soft_restart(&self) -> Result<(), RestartError> {
        self.transport.soft_restart().await?;
        self.wait_alive().await?;
        info!("transport back after soft restart");
        Ok(())
    }

    async fn hard_restart(&self) -> Result<(), RestartError> {
        self.runner.pause();

        let result = async {
            self.sessions.close_all().await;
            self.transport.shutdown(false).await?;
            self.transport.start().await?;

            self.directory.clear();
            let abandoned = self.tracker.sweep();
            debug!(abandoned, "cleared peer state after hard restart");
            Ok::<_, RestartError>(())
        }
        .await;

        self.runner.resume();
        result
    }

    fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    async fn establish_session(&self) -> Result<(), RestartError> {
        self.sessions
            .get_or_open(self.transport.as_ref(), DEFAULT_SESSION)
            .await?;
        Ok(())
    }

    fn local_id(&self) -> Option<String> {
        self.transport.local_peer().map(|peer| {
            if peer.id().is_empty() {
                peer.fingerprint().to_string()
            } else {
                peer.id().to_owned()
            }
        })
    }
}

/// Send path handed to discovery. A closed session is reported to the
/// monitor before the error is returned.
pub(crate) struct ServiceOutbound<T, C> {
    pub(crate) core: Arc<ServiceCore<T>>,
    pub(crate) monitor: Arc<StatusMonitor<C>>,
}

impl<T: TransportProvider, C: Clock> ServiceOutbound<T, C> {
    pub(crate) async fn send_envelope(&self, envelope: &Envelope) -> Result<(), ServiceError> {
        let result = self.core.send_out(envelope).await;
        if let Err(ServiceError::Transport(TransportError::SessionClosed)) = &result {
            if let Err(err) = self.monitor.on_session_closed().await {
                warn!(%err, "restart after closed session failed");
            }
        }
        result
    }
}

#[async_trait]
impl<T: TransportProvider, C: Clock> Outbound for ServiceOutbound<T, C> {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.send_envelope(&envelope)
            .await
            .map_err(ServiceError::into_transport)
    }
}
