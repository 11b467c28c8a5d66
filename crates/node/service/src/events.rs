//! Routes transport notifications to discovery and the connectivity monitor.

use std::sync::Arc;

use cloak_net_connectivity::StatusMonitor;
use cloak_net_discovery::{DiscoveryHandle, InboundMessage};
use cloak_net_primitives::Clock;
use cloak_net_transport::{TransportEvent, TransportProvider, TransportStatus};
use metrics::counter;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub(crate) async fn run_event_loop<T: TransportProvider, C: Clock>(
    mut events: broadcast::Receiver<TransportEvent>,
    transport: Arc<T>,
    discovery: DiscoveryHandle,
    monitor: Arc<StatusMonitor<C>>,
    shutdown: CancellationToken,
) {
    debug!("transport event loop started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                debug!("transport event loop received shutdown signal");
                break;
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if !dispatch(event, transport.as_ref(), &discovery, &monitor).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "transport event loop lagged");
                        counter!("cloak_service_events_lagged_total").increment(skipped);
                    }
                    Err(RecvError::Closed) => {
                        info!("transport event stream closed");
                        break;
                    }
                }
            }
        }
    }

    debug!("transport event loop stopped");
}

/// Returns `false` once discovery is gone and the loop should end.
async fn dispatch<T: TransportProvider, C: Clock>(
    event: TransportEvent,
    transport: &T,
    discovery: &DiscoveryHandle,
    monitor: &Arc<StatusMonitor<C>>,
) -> bool {
    match event {
        TransportEvent::Message { sender, payload } => {
            if discovery
                .inbound(InboundMessage { sender, payload })
                .await
                .is_err()
            {
                debug!("discovery channel closed");
                return false;
            }
        }
        TransportEvent::StatusChanged(status) => report(monitor, status),
        TransportEvent::Disconnected => {
            warn!("transport disconnected");
            report_current(monitor, transport);
        }
        TransportEvent::Error { message } => {
            error!(%message, "transport error");
            report_current(monitor, transport);
        }
        TransportEvent::Abuse { severity, reason } => {
            warn!(severity, %reason, "transport reported abuse");
            counter!("cloak_service_abuse_reports_total").increment(1);
            report_current(monitor, transport);
        }
    }
    true
}

/// Re-evaluate whatever the transport reports now. No status yet means nothing to evaluate.
fn report_current<T: TransportProvider, C: Clock>(monitor: &Arc<StatusMonitor<C>>, transport: &T) {
    match transport.status() {
        Some(status) => report(monitor, status),
        None => debug!("transport has no status yet, skipping re-evaluation"),
    }
}

// Restarts can hold the monitor for minutes; keep the loop draining.
fn report<C: Clock>(monitor: &Arc<StatusMonitor<C>>, status: TransportStatus) {
    let monitor = Arc::clone(monitor);
    tokio::spawn(async move {
        monitor.report_status(status).await;
    });
}
