//! Interface of the anonymizing transport as seen by the control layer.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use cloak_net_peers::{Fingerprint, NetworkPeer};
use cloak_net_primitives::NetworkTag;
use tokio::sync::broadcast;

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::status::TransportStatus;

/// Identity of a message sender as observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub address: String,
    pub fingerprint: Fingerprint,
}

/// Notification pushed by the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Inbound datagram, not yet decoded.
    Message {
        sender: SenderIdentity,
        payload: Bytes,
    },
    StatusChanged(TransportStatus),
    Error {
        message: String,
    },
    Disconnected,
    /// The provider flagged abusive traffic.
    Abuse {
        severity: u32,
        reason: String,
    },
}

/// A session bound to the local destination.
#[async_trait]
pub trait TransportSession: Send + Sync + 'static {
    /// Open the session under `alias`.
    async fn open(&self, alias: &str) -> Result<(), TransportError>;

    async fn connect(&self) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn close(&self) -> Result<(), TransportError>;

    /// Fire-and-forget send. The envelope's destination must be set.
    async fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

/// The transport router: lifecycle, status and session factory.
#[async_trait]
pub trait TransportProvider: Send + Sync + 'static {
    /// Tag of the overlay this provider serves.
    fn network(&self) -> &NetworkTag;

    /// Current status, `None` until the router has come up.
    fn status(&self) -> Option<TransportStatus>;

    /// The local node as a peer, once its destination is known.
    fn local_peer(&self) -> Option<NetworkPeer>;

    /// Peers the router currently talks to.
    fn active_peers_count(&self) -> usize;

    /// Inbound messages and notifications.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    fn new_session(&self) -> Arc<dyn TransportSession>;

    async fn start(&self) -> Result<(), TransportError>;

    /// Restart in place, keeping the process and configuration.
    async fn soft_restart(&self) -> Result<(), TransportError>;

    fn is_alive(&self) -> bool;

    async fn shutdown(&self, graceful: bool) -> Result<(), TransportError>;

    /// Apply a provider setting. Returns whether the persisted value changed.
    fn update_setting(&self, key: &str, value: &str) -> Result<bool, TransportError>;
}
