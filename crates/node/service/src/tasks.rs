//! Periodic work scheduled on the service's [`TaskRunner`](cloak_tasks::TaskRunner).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloak_net_connectivity::StatusMonitor;
use cloak_net_discovery::DiscoveryHandle;
use cloak_net_primitives::Clock;
use cloak_net_transport::TransportProvider;
use cloak_tasks::PeriodicTask;
use tracing::{trace, warn};

/// Polls the transport status and feeds it to the monitor.
pub(crate) struct StatusCheckTask<T, C> {
    pub(crate) transport: Arc<T>,
    pub(crate) monitor: Arc<StatusMonitor<C>>,
    pub(crate) period: Duration,
}

#[async_trait]
impl<T: TransportProvider, C: Clock> PeriodicTask for StatusCheckTask<T, C> {
    fn name(&self) -> &'static str {
        "connectivity-check"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run(&self) {
        let state = self.monitor.check_status(self.transport.status()).await;
        trace!(%state, "connectivity checked");
    }
}

/// Queues a discovery tick for the discovery owner task.
pub(crate) struct DiscoveryTickTask {
    pub(crate) handle: DiscoveryHandle,
    pub(crate) period: Duration,
}

#[async_trait]
impl PeriodicTask for DiscoveryTickTask {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn period(&self) -> Duration {
        self.period
    }

    // Give the first status check a head start.
    fn initial_delay(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn run(&self) {
        if let Err(err) = self.handle.tick() {
            warn!(%err, "discovery task is gone");
        }
    }
}
