//! In-process transport used by tests and the dev mesh.
//!
//! Every [`MemoryTransport`] attached to the same [`MemoryNetwork`] can reach
//! the others by fingerprint. Messages are encoded with [`EnvelopeCodec`] and
//! delivered as [`TransportEvent::Message`] with the sender's true identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use cloak_net_peers::{Fingerprint, NetworkPeer};
use cloak_net_primitives::NetworkTag;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::codec::EnvelopeCodec;
use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::facade::{SenderIdentity, TransportEvent, TransportProvider, TransportSession};
use crate::status::TransportStatus;

const EVENT_CAPACITY: usize = 1024;

/// Settings understood by the in-memory provider.
pub const SETTING_HIDDEN_MODE: &str = "hiddenMode";
pub const SETTING_SHARE_PERCENTAGE: &str = "sharePercentage";
pub const SETTING_ENABLE_GEOIP: &str = "enableGeoIP";

/// Shared medium connecting in-memory transports.
#[derive(Debug)]
pub struct MemoryNetwork {
    tag: NetworkTag,
    nodes: Mutex<HashMap<Fingerprint, broadcast::Sender<TransportEvent>>>,
}

impl MemoryNetwork {
    pub fn new(tag: NetworkTag) -> Arc<Self> {
        Arc::new(Self {
            tag,
            nodes: Mutex::new(HashMap::new()),
        })
    }

    pub fn tag(&self) -> &NetworkTag {
        &self.tag
    }

    /// Create a transport for the node with `fingerprint`. It joins the
    /// network on `start`.
    pub fn transport(self: &Arc<Self>, fingerprint: impl Into<Fingerprint>) -> MemoryTransport {
        let fingerprint = fingerprint.into();
        let local = NetworkPeer::new(
            self.tag.clone(),
            format!("mem://{}", fingerprint),
            fingerprint,
        );
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        MemoryTransport {
            inner: Arc::new(Inner {
                network: Arc::clone(self),
                local,
                events,
                status: Mutex::new(None),
                alive: AtomicBool::new(false),
                settings: Mutex::new(HashMap::new()),
                starts: AtomicUsize::new(0),
                soft_restarts: AtomicUsize::new(0),
                shutdowns: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of transports currently attached.
    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn attach(&self, fingerprint: Fingerprint, events: broadcast::Sender<TransportEvent>) {
        self.nodes.lock().insert(fingerprint, events);
    }

    fn detach(&self, fingerprint: &Fingerprint) {
        self.nodes.lock().remove(fingerprint);
    }

    fn deliver(
        &self,
        sender: SenderIdentity,
        to: &Fingerprint,
        payload: Bytes,
    ) -> Result<(), TransportError> {
        let target = self
            .nodes
            .lock()
            .get(to)
            .cloned()
            .ok_or_else(|| TransportError::DestinationNotFound(to.clone()))?;

        // No subscriber means the datagram is lost, as on a real overlay.
        if target.send(TransportEvent::Message { sender, payload }).is_err() {
            trace!(to = %to.short(), "no receiver for datagram");
        }
        Ok(())
    }
}

/// In-memory [`TransportProvider`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    network: Arc<MemoryNetwork>,
    local: NetworkPeer,
    events: broadcast::Sender<TransportEvent>,
    status: Mutex<Option<TransportStatus>>,
    alive: AtomicBool,
    settings: Mutex<HashMap<String, String>>,
    starts: AtomicUsize,
    soft_restarts: AtomicUsize,
    shutdowns: AtomicUsize,
}

impl MemoryTransport {
    /// Force a status and notify subscribers.
    pub fn set_status(&self, status: Option<TransportStatus>) {
        *self.inner.status.lock() = status.clone();
        if let Some(status) = status {
            let _ = self.inner.events.send(TransportEvent::StatusChanged(status));
        }
    }

    /// Push an arbitrary notification to subscribers.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.inner.events.send(event);
    }

    pub fn starts(&self) -> usize {
        self.inner.starts.load(Ordering::SeqCst)
    }

    pub fn soft_restarts(&self) -> usize {
        self.inner.soft_restarts.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.inner.shutdowns.load(Ordering::SeqCst)
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.inner.settings.lock().get(key).cloned()
    }

    fn sender_identity(&self) -> SenderIdentity {
        SenderIdentity {
            address: self.inner.local.address().to_owned(),
            fingerprint: self.inner.local.fingerprint().clone(),
        }
    }
}

#[async_trait]
impl TransportProvider for MemoryTransport {
    fn network(&self) -> &NetworkTag {
        self.inner.network.tag()
    }

    fn status(&self) -> Option<TransportStatus> {
        self.inner.status.lock().clone()
    }

    fn local_peer(&self) -> Option<NetworkPeer> {
        self.is_alive().then(|| self.inner.local.clone())
    }

    fn active_peers_count(&self) -> usize {
        if !self.is_alive() {
            return 0;
        }
        self.inner.network.len().saturating_sub(1)
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.events.subscribe()
    }

    fn new_session(&self) -> Arc<dyn TransportSession> {
        Arc::new(MemorySession {
            transport: self.clone(),
            state: Mutex::new(SessionState::Idle),
        })
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.inner.starts.fetch_add(1, Ordering::SeqCst);
        self.inner.network.attach(
            self.inner.local.fingerprint().clone(),
            self.inner.events.clone(),
        );
        self.inner.alive.store(true, Ordering::SeqCst);
        self.set_status(Some(TransportStatus::Ok));
        debug!(local = %self.inner.local, "memory transport started");
        Ok(())
    }

    async fn soft_restart(&self) -> Result<(), TransportError> {
        self.inner.soft_restarts.fetch_add(1, Ordering::SeqCst);
        self.inner.alive.store(true, Ordering::SeqCst);
        self.set_status(Some(TransportStatus::Ok));
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self, graceful: bool) -> Result<(), TransportError> {
        self.inner.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.network.detach(self.inner.local.fingerprint());
        self.inner.alive.store(false, Ordering::SeqCst);
        *self.inner.status.lock() = None;
        debug!(local = %self.inner.local, graceful, "memory transport stopped");
        Ok(())
    }

    fn update_setting(&self, key: &str, value: &str) -> Result<bool, TransportError> {
        let value = match key {
            SETTING_HIDDEN_MODE | SETTING_ENABLE_GEOIP => {
                value.eq_ignore_ascii_case("true").to_string()
            }
            SETTING_SHARE_PERCENTAGE => value
                .parse::<u8>()
                .ok()
                .filter(|pct| *pct <= 100)
                .ok_or_else(|| TransportError::Other(format!("invalid share percentage: {value}")))?
                .to_string(),
            _ => return Err(TransportError::UnknownSetting(key.to_owned())),
        };

        let mut settings = self.inner.settings.lock();
        let previous = settings.insert(key.to_owned(), value.clone());
        Ok(previous.as_deref() != Some(value.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Open,
    Connected,
    Closed,
}

struct MemorySession {
    transport: MemoryTransport,
    state: Mutex<SessionState>,
}

#[async_trait]
impl TransportSession for MemorySession {
    async fn open(&self, alias: &str) -> Result<(), TransportError> {
        if !self.transport.is_alive() {
            return Err(TransportError::NotRunning);
        }
        let mut state = self.state.lock();
        if *state == SessionState::Closed {
            return Err(TransportError::SessionClosed);
        }
        *state = SessionState::Open;
        trace!(alias, "memory session opened");
        Ok(())
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Open | SessionState::Connected => {
                *state = SessionState::Connected;
                Ok(())
            }
            SessionState::Closed => Err(TransportError::SessionClosed),
            SessionState::Idle => Err(TransportError::NotConnected),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if *state == SessionState::Connected {
            *state = SessionState::Open;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        *self.state.lock() = SessionState::Closed;
        Ok(())
    }

    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        match *self.state.lock() {
            SessionState::Connected => {}
            SessionState::Closed => return Err(TransportError::SessionClosed),
            SessionState::Idle | SessionState::Open => return Err(TransportError::NotConnected),
        }
        if !self.transport.is_alive() {
            return Err(TransportError::NotRunning);
        }

        let destination = envelope
            .destination()
            .ok_or_else(|| TransportError::DestinationNotFound(Fingerprint::default()))?;
        let bytes = EnvelopeCodec.encode(envelope)?;

        self.transport.inner.network.deliver(
            self.transport.sender_identity(),
            destination.fingerprint(),
            bytes,
        )
    }

    fn is_connected(&self) -> bool {
        *self.state.lock() == SessionState::Connected
    }
}
