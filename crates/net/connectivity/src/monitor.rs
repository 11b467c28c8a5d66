//! Connectivity status monitor.
//!
//! Polls the transport status, maps it to a [`ConnectivityState`] and applies
//! the [`RestartPolicy`]. All state changes go through one async mutex, so a
//! restart in progress serializes later checks instead of racing them.

use std::sync::Arc;

use async_trait::async_trait;
use cloak_net_peers::PeerDirectory;
use cloak_net_primitives::Clock;
use cloak_net_transport::TransportStatus;
use metrics::counter;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::error::RestartError;
use crate::policy::{BlockedDecision, RestartKind, RestartPolicy, RestartPolicyConfig};
use crate::state::{ConnectivityState, classify};

/// Actions the monitor needs from the node to recover connectivity.
#[async_trait]
pub trait RecoveryHooks: Send + Sync + 'static {
    /// Restart the transport in place and wait until it is alive again.
    async fn soft_restart(&self) -> Result<(), RestartError>;

    /// Stop sessions and scheduled work, restart the transport, resume.
    async fn hard_restart(&self) -> Result<(), RestartError>;

    /// Number of open sessions.
    fn active_sessions(&self) -> usize;

    /// Open and connect a session ahead of the first outbound message.
    async fn establish_session(&self) -> Result<(), RestartError>;

    /// Identifier of the local node, once the transport knows it.
    fn local_id(&self) -> Option<String>;
}

#[derive(Debug)]
struct MonitorInner {
    last_status: Option<TransportStatus>,
    policy: RestartPolicy,
}

pub struct StatusMonitor<C> {
    clock: C,
    directory: Arc<PeerDirectory>,
    hooks: Arc<dyn RecoveryHooks>,
    inner: Mutex<MonitorInner>,
    state: watch::Sender<ConnectivityState>,
}

impl<C: Clock> StatusMonitor<C> {
    pub fn new(
        config: RestartPolicyConfig,
        clock: C,
        directory: Arc<PeerDirectory>,
        hooks: Arc<dyn RecoveryHooks>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectivityState::Unknown);
        Self {
            clock,
            directory,
            hooks,
            inner: Mutex::new(MonitorInner {
                last_status: None,
                policy: RestartPolicy::new(config),
            }),
            state,
        }
    }

    /// Current connectivity state.
    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.subscribe()
    }

    pub async fn restart_attempts(&self) -> u32 {
        self.inner.lock().await.policy.attempts()
    }

    /// Scheduled poll of the transport status.
    ///
    /// `None` means the transport is not up yet and is ignored. An unchanged
    /// status causes no transition, though an armed blocked timer is still
    /// checked so a node stuck in `Blocked` eventually restarts.
    pub async fn check_status(&self, status: Option<TransportStatus>) -> ConnectivityState {
        let Some(status) = status else {
            return self.state();
        };

        let mut inner = self.inner.lock().await;
        if inner.last_status.as_ref() == Some(&status) {
            if self.state() == ConnectivityState::Blocked {
                self.on_blocked(&mut inner).await;
            }
            return self.state();
        }

        info!(%status, "transport status changed");
        inner.last_status = Some(status.clone());
        self.evaluate(&mut inner, &status).await;
        self.state()
    }

    /// Status pushed by a transport notification. Always re-evaluated.
    pub async fn report_status(&self, status: TransportStatus) -> ConnectivityState {
        let mut inner = self.inner.lock().await;
        debug!(%status, "transport status reported");
        inner.last_status = Some(status.clone());
        self.evaluate(&mut inner, &status).await;
        self.state()
    }

    /// A send found the session already closed.
    pub async fn on_session_closed(&self) -> Result<RestartKind, RestartError> {
        let mut inner = self.inner.lock().await;
        warn!("session closed underneath us, treating network as blocked");
        // Blocked here is not backed by a transport status; the next poll must re-evaluate.
        inner.last_status = None;
        self.publish(ConnectivityState::Blocked);
        self.restart_locked(&mut inner).await
    }

    /// Run one restart according to the policy.
    pub async fn restart(&self) -> Result<RestartKind, RestartError> {
        let mut inner = self.inner.lock().await;
        self.restart_locked(&mut inner).await
    }

    async fn evaluate(&self, inner: &mut MonitorInner, status: &TransportStatus) {
        let next = classify(status);
        let previous = self.state();

        if let TransportStatus::Unrecognized(code) = status {
            warn!(%code, "unrecognized transport status");
        }
        if previous == ConnectivityState::Blocked && next != ConnectivityState::Blocked {
            inner.policy.clear_blocked();
        }
        if next.is_failure() {
            warn!(%previous, %next, "connectivity degraded");
        } else {
            info!(%previous, %next, "connectivity");
        }
        self.publish(next);

        match next {
            ConnectivityState::Connected => {
                inner.policy.on_connected();
                self.on_connected().await;
            }
            ConnectivityState::Disconnected => {
                // Failure is logged inside; the next poll retries.
                let _ = self.restart_locked(inner).await;
            }
            ConnectivityState::Blocked => self.on_blocked(inner).await,
            ConnectivityState::Unknown
            | ConnectivityState::Connecting
            | ConnectivityState::PortConflict
            | ConnectivityState::Error => {}
        }
    }

    async fn on_blocked(&self, inner: &mut MonitorInner) {
        match inner.policy.on_blocked(self.clock.now_millis()) {
            BlockedDecision::Armed => debug!("blocked timer armed"),
            BlockedDecision::Wait { blocked_for } => {
                debug!(blocked_secs = blocked_for.as_secs(), "still blocked")
            }
            BlockedDecision::Restart => {
                info!("blocked for too long, restarting");
                let _ = self.restart_locked(inner).await;
            }
        }
    }

    async fn on_connected(&self) {
        if self.hooks.active_sessions() > 0 {
            return;
        }

        info!("connected with no sessions, establishing one");
        if let Err(err) = self.hooks.establish_session().await {
            warn!(%err, "failed to establish session");
        }

        if let Some(local_id) = self.hooks.local_id() {
            let added = self.directory.bootstrap_seeds(&local_id);
            if added > 0 {
                info!(added, "seeded empty peer directory");
            }
        }
    }

    async fn restart_locked(&self, inner: &mut MonitorInner) -> Result<RestartKind, RestartError> {
        let kind = inner.policy.next_restart();
        counter!("cloak_connectivity_restarts_total", "kind" => kind.as_str()).increment(1);
        info!(%kind, attempts = inner.policy.attempts(), "restarting transport");

        let result = match kind {
            RestartKind::Soft => self.hooks.soft_restart().await,
            RestartKind::Hard => self.hooks.hard_restart().await,
        };
        inner.policy.record_restart(kind, result.is_ok());

        match result {
            Ok(()) => {
                info!(%kind, "restart completed");
                if kind == RestartKind::Hard {
                    // Force the next poll to re-evaluate whatever the fresh transport reports.
                    inner.last_status = None;
                }
                Ok(kind)
            }
            Err(err) => {
                error!(%kind, %err, "restart failed");
                Err(err)
            }
        }
    }

    fn publish(&self, state: ConnectivityState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}
