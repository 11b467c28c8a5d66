//! The network service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cloak_net_connectivity::{ConnectivityState, StatusMonitor};
use cloak_net_discovery::{
    Discovery, DiscoveryHandle, InFlightTracker, MessageBus, discovery_channel, run_discovery,
};
use cloak_net_peers::{NetworkPeer, PeerDirectory};
use cloak_net_primitives::{Clock, SystemClock};
use cloak_net_transport::{Envelope, TransportProvider};
use cloak_node_core::config::CloakConfig;
use cloak_tasks::{CancellationToken, TaskRunner};
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::shared::{ServiceCore, ServiceOutbound};
use crate::error::ServiceError;
use crate::events::run_event_loop;
use crate::operation::{Operation, OperationOutcome};
use crate::sessions::SessionCache;
use crate::tasks::{DiscoveryTickTask, StatusCheckTask};

/// Components that exist once the transport is up.
struct Running<T, C> {
    core: Arc<ServiceCore<T>>,
    monitor: Arc<StatusMonitor<C>>,
    outbound: Arc<ServiceOutbound<T, C>>,
    discovery: Arc<Discovery<C>>,
    handle: DiscoveryHandle,
}

/// Keeps a node connected to the overlay and its peer directory fresh.
///
/// [`start`](Self::start) brings up the transport, then schedules the status
/// check and discovery on a [`TaskRunner`]. Transport notifications are routed
/// by a background event loop. Everything stops on [`shutdown`](Self::shutdown).
pub struct NetworkService<T, C = SystemClock> {
    config: CloakConfig,
    transport: Arc<T>,
    clock: C,
    bus: Arc<dyn MessageBus>,
    shutdown: CancellationToken,
    runner: Arc<TaskRunner>,
    started: AtomicBool,
    running: RwLock<Option<Arc<Running<T, C>>>>,
    background: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl<T: TransportProvider> NetworkService<T, SystemClock> {
    pub fn new(config: CloakConfig, transport: T, bus: Arc<dyn MessageBus>) -> Self {
        Self::with_clock(config, transport, bus, SystemClock)
    }
}

impl<T: TransportProvider, C: Clock + Clone> NetworkService<T, C> {
    pub fn with_clock(
        config: CloakConfig,
        transport: T,
        bus: Arc<dyn MessageBus>,
        clock: C,
    ) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            config,
            transport: Arc::new(transport),
            clock,
            bus,
            runner: Arc::new(TaskRunner::new(shutdown.clone())),
            shutdown,
            started: AtomicBool::new(false),
            running: RwLock::new(None),
            background: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &CloakConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.read().is_some()
    }

    /// Start the transport and everything that depends on it.
    pub async fn start(&self) -> Result<(), ServiceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        // Subscribe first so nothing emitted during start is lost.
        let events = self.transport.subscribe();
        let local = match self.start_transport().await {
            Ok(local) => local,
            Err(err) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let network = &self.config.network;
        let directory = Arc::new(PeerDirectory::new(
            self.transport.network().clone(),
            local.fingerprint().clone(),
            network.max_known_peers,
            network.seed_peers(),
        ));
        let tracker = Arc::new(InFlightTracker::new());

        let core = Arc::new(ServiceCore {
            transport: self.transport.clone(),
            local: local.clone(),
            sessions: SessionCache::new(),
            directory: directory.clone(),
            tracker: tracker.clone(),
            runner: self.runner.clone(),
            soft_restart_timeout: self.config.monitor.soft_restart_timeout(),
            soft_restart_poll: self.config.monitor.soft_restart_poll(),
        });
        let monitor = Arc::new(StatusMonitor::new(
            self.config.monitor.restart_policy(),
            self.clock.clone(),
            directory.clone(),
            core.clone(),
        ));
        let outbound = Arc::new(ServiceOutbound {
            core: core.clone(),
            monitor: monitor.clone(),
        });
        let discovery = Arc::new(Discovery::new(
            local.clone(),
            directory.clone(),
            tracker,
            monitor.subscribe(),
            outbound.clone(),
            self.bus.clone(),
            self.clock.clone(),
        ));

        let (handle, rx) = discovery_channel(self.config.discovery.inbound_capacity);
        {
            let mut background = self.background.lock();
            background.push((
                "discovery",
                tokio::spawn(run_discovery(discovery.clone(), rx, self.shutdown.clone())),
            ));
            background.push((
                "transport-events",
                tokio::spawn(run_event_loop(
                    events,
                    self.transport.clone(),
                    handle.clone(),
                    monitor.clone(),
                    self.shutdown.clone(),
                )),
            ));
        }

        self.runner.spawn_periodic(Arc::new(StatusCheckTask {
            transport: self.transport.clone(),
            monitor: monitor.clone(),
            period: self.config.monitor.interval(),
        }));
        self.runner.spawn_periodic(Arc::new(DiscoveryTickTask {
            handle: handle.clone(),
            period: self.config.discovery.interval(),
        }));

        *self.running.write() = Some(Arc::new(Running {
            core,
            monitor,
            outbound,
            discovery,
            handle,
        }));

        info!(
            %local,
            seeds = directory.seeds().len(),
            max_peers = directory.capacity(),
            "network service started"
        );
        Ok(())
    }

    async fn start_transport(&self) -> Result<NetworkPeer, ServiceError> {
        self.transport.start().await?;
        self.transport.local_peer().ok_or(ServiceError::NoLocalPeer)
    }

    /// Stop scheduled work, close sessions and stop the transport.
    pub async fn shutdown(&self, graceful: bool) -> Result<(), ServiceError> {
        info!(graceful, "shutting down network service");
        self.runner.shutdown().await;

        let background: Vec<_> = self.background.lock().drain(..).collect();
        for (name, handle) in background {
            if let Err(err) = handle.await {
                warn!(task = name, %err, "background task ended abnormally");
            }
        }

        let running = self.running.write().take();
        if let Some(running) = running {
            running.core.sessions.close_all().await;
            let abandoned = running.core.tracker.sweep();
            debug!(abandoned, "in-flight requests dropped");
        }

        self.transport.shutdown(graceful).await?;
        Ok(())
    }

    /// Send an envelope to its destination over the default session.
    pub async fn send(&self, envelope: Envelope) -> Result<(), ServiceError> {
        self.running()?.outbound.send_envelope(&envelope).await
    }

    /// Serve a single [`Operation`].
    pub async fn handle_operation(
        &self,
        operation: Operation,
    ) -> Result<OperationOutcome, ServiceError> {
        debug!(operation = operation.name(), "handling operation");

        match operation {
            Operation::Send(envelope) => {
                self.send(envelope).await?;
                Ok(OperationOutcome::Sent)
            }
            Operation::CheckStatus => {
                let running = self.running()?;
                let state = running.monitor.check_status(self.transport.status()).await;
                Ok(OperationOutcome::Status(state))
            }
            Operation::ActivePeersCount => {
                Ok(OperationOutcome::Count(self.transport.active_peers_count()))
            }
            Operation::KnownPeersCount => {
                Ok(OperationOutcome::Count(self.running()?.core.directory.count()))
            }
            Operation::LocalPeer => Ok(OperationOutcome::LocalPeer(self.transport.local_peer())),
            Operation::UpdateSetting { key, value } => {
                let running = self.running()?;
                let changed = self.transport.update_setting(&key, &value)?;
                info!(%key, %value, changed, "transport setting updated");

                let restart = if changed {
                    Some(running.monitor.restart().await?)
                } else {
                    None
                };
                Ok(OperationOutcome::SettingUpdated { changed, restart })
            }
            Operation::Other { name } => {
                warn!(%name, "no handler for operation, dead-lettering");
                counter!("cloak_service_dead_letters_total").increment(1);
                Ok(OperationOutcome::DeadLetter { name })
            }
        }
    }

    /// Connectivity state, [`Unknown`](ConnectivityState::Unknown) before start.
    pub fn state(&self) -> ConnectivityState {
        self.running
            .read()
            .as_ref()
            .map_or(ConnectivityState::Unknown, |running| running.monitor.state())
    }

    pub fn local_peer(&self) -> Option<NetworkPeer> {
        self.running.read().as_ref().map(|running| running.core.local.clone())
    }

    pub fn directory(&self) -> Option<Arc<PeerDirectory>> {
        self.running
            .read()
            .as_ref()
            .map(|running| running.core.directory.clone())
    }

    pub fn tracker(&self) -> Option<Arc<InFlightTracker>> {
        self.running
            .read()
            .as_ref()
            .map(|running| running.discovery.tracker().clone())
    }

    pub async fn restart_attempts(&self) -> Result<u32, ServiceError> {
        Ok(self.running()?.monitor.restart_attempts().await)
    }

    /// Queue a discovery round now instead of waiting for the next tick.
    pub fn discover_now(&self) -> Result<(), ServiceError> {
        self.running()?
            .handle
            .tick()
            .map_err(|_| ServiceError::NotStarted)
    }

    fn running(&self) -> Result<Arc<Running<T, C>>, ServiceError> {
        self.running.read().clone().ok_or(ServiceError::NotStarted)
    }
}
