//! The discovery request/response protocol.

use std::sync::Arc;

use async_trait::async_trait;
use auto_impl::auto_impl;
use bytes::Bytes;
use cloak_net_connectivity::ConnectivityState;
use cloak_net_peers::{MergeSummary, NetworkPeer, PeerDirectory};
use cloak_net_primitives::{Clock, MessageId, Millis};
use cloak_net_transport::{Envelope, EnvelopeCodec, Marker, SenderIdentity, TransportError};
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::DiscoveryError;
use crate::inflight::InFlightTracker;

/// Send path used by discovery.
#[async_trait]
pub trait Outbound: Send + Sync + 'static {
    async fn send(&self, envelope: Envelope) -> Result<(), TransportError>;
}

/// Receiver of inbound application messages.
#[auto_impl(Arc, Box)]
pub trait MessageBus: Send + Sync + 'static {
    fn publish(&self, envelope: Envelope);
}

/// A raw datagram from the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender: SenderIdentity,
    pub payload: Bytes,
}

/// Why a tick did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
    DirectoryFull,
}

/// Result of one discovery tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Ran {
        timed_out: usize,
        sent: usize,
        failed: usize,
    },
}

/// What an inbound message turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    Response {
        merged: MergeSummary,
        round_trip: Option<Millis>,
    },
    Request {
        merged: MergeSummary,
        replied: bool,
    },
    Application,
}

/// Periodic peer exchange with seeds and known peers.
pub struct Discovery<C> {
    local: NetworkPeer,
    directory: Arc<PeerDirectory>,
    tracker: Arc<InFlightTracker>,
    connectivity: watch::Receiver<ConnectivityState>,
    outbound: Arc<dyn Outbound>,
    bus: Arc<dyn MessageBus>,
    clock: C,
    codec: EnvelopeCodec,
}

impl<C: Clock> Discovery<C> {
    pub fn new(
        local: NetworkPeer,
        directory: Arc<PeerDirectory>,
        tracker: Arc<InFlightTracker>,
        connectivity: watch::Receiver<ConnectivityState>,
        outbound: Arc<dyn Outbound>,
        bus: Arc<dyn MessageBus>,
        clock: C,
    ) -> Self {
        Self {
            local,
            directory,
            tracker,
            connectivity,
            outbound,
            bus,
            clock,
            codec: EnvelopeCodec,
        }
    }

    pub fn local(&self) -> &NetworkPeer {
        &self.local
    }

    pub fn directory(&self) -> &Arc<PeerDirectory> {
        &self.directory
    }

    pub fn tracker(&self) -> &Arc<InFlightTracker> {
        &self.tracker
    }

    /// One discovery round.
    ///
    /// Requests left from the previous round are counted as timed out. An
    /// empty directory asks every seed; otherwise one random known peer. The
    /// monitor copies the seeds into the directory on connect, so the
    /// every-seed path mostly runs when that copy was skipped or after a clear.
    pub async fn tick(&self) -> TickOutcome {
        if !self.connectivity.borrow().is_connected() {
            trace!("not connected, skipping discovery");
            return TickOutcome::Skipped(SkipReason::NotConnected);
        }
        if self.directory.is_full() {
            trace!(capacity = self.directory.capacity(), "directory full, skipping discovery");
            return TickOutcome::Skipped(SkipReason::DirectoryFull);
        }

        let timed_out = self.tracker.sweep();
        if timed_out > 0 {
            warn!(timed_out, "discovery requests timed out");
            counter!("cloak_discovery_timeouts_total").increment(timed_out as u64);
        }

        let targets: Vec<NetworkPeer> = if self.directory.is_empty() {
            self.directory
                .seeds()
                .into_iter()
                .filter(|seed| seed.fingerprint() != self.local.fingerprint())
                .collect()
        } else {
            match self.directory.random_known_peer() {
                Ok(peer) => vec![peer],
                Err(err) => {
                    debug!(%err, "no peer to query");
                    Vec::new()
                }
            }
        };

        let mut sent = 0;
        let mut failed = 0;
        for target in targets {
            if self.send_request(target).await {
                sent += 1;
            } else {
                failed += 1;
            }
        }

        debug!(
            timed_out,
            sent,
            failed,
            known = self.directory.count(),
            "discovery tick"
        );
        TickOutcome::Ran {
            timed_out,
            sent,
            failed,
        }
    }

    async fn send_request(&self, target: NetworkPeer) -> bool {
        let peer = target.to_string();
        let envelope =
            Envelope::discovery_request(self.local.clone(), target, self.directory.known_peers());
        let id = envelope.id.clone();

        self.tracker.record(id.clone(), self.clock.now_millis());
        match self.outbound.send(envelope).await {
            Ok(()) => {
                counter!("cloak_discovery_requests_sent_total").increment(1);
                trace!(id = %id.short(), %peer, "discovery request sent");
                true
            }
            Err(err) => {
                self.tracker.remove(&id);
                warn!(id = %id.short(), %peer, %err, "failed to send discovery request");
                false
            }
        }
    }

    /// Process a datagram from the transport.
    ///
    /// The origination is always rebuilt from the sender identity the
    /// transport observed, then recorded as a known peer. Malformed payloads
    /// are rejected before anything is touched.
    pub async fn handle_inbound(
        &self,
        message: InboundMessage,
    ) -> Result<InboundOutcome, DiscoveryError> {
        let mut envelope = self.codec.decode(&message.payload)?;

        let origination = self.origination_of(&envelope, message.sender);
        envelope.route.origination = Some(origination.clone());
        self.directory.add(origination.clone());

        let kind = envelope.marker.map_or("application", |marker| match marker {
            Marker::DiscoveryRequest => "discovery-request",
            Marker::DiscoveryResponse => "discovery-response",
        });
        counter!("cloak_discovery_inbound_total", "kind" => kind).increment(1);

        match envelope.marker {
            Some(Marker::DiscoveryResponse) => {
                let id = envelope.id.clone();
                let merged = self.directory.add_all(envelope.into_peers());
                let round_trip = self.tracker.complete(&id, self.clock.now_millis());
                match round_trip {
                    Some(ms) => {
                        histogram!("cloak_discovery_round_trip_ms").record(ms as f64);
                        debug!(
                            id = %id.short(),
                            round_trip_ms = ms,
                            from = %origination,
                            "discovery response"
                        );
                    }
                    None => debug!(
                        id = %id.short(),
                        from = %origination,
                        "untracked discovery response"
                    ),
                }
                Ok(InboundOutcome::Response { merged, round_trip })
            }
            Some(Marker::DiscoveryRequest) => {
                let id = envelope.id.clone();
                let merged = self.directory.add_all(envelope.into_peers());
                let replied = self.reply(id, origination).await;
                Ok(InboundOutcome::Request { merged, replied })
            }
            None => {
                trace!(id = %envelope.id.short(), from = %origination, "forwarding to message bus");
                self.bus.publish(envelope);
                Ok(InboundOutcome::Application)
            }
        }
    }

    async fn reply(&self, id: MessageId, to: NetworkPeer) -> bool {
        let peer = to.to_string();
        let response = Envelope::discovery_response(
            id.clone(),
            self.local.clone(),
            to,
            self.directory.known_peers(),
        );

        match self.outbound.send(response).await {
            Ok(()) => {
                trace!(id = %id.short(), %peer, "discovery response sent");
                true
            }
            Err(err) => {
                warn!(id = %id.short(), %peer, %err, "failed to answer discovery request");
                false
            }
        }
    }

    fn origination_of(&self, envelope: &Envelope, sender: SenderIdentity) -> NetworkPeer {
        let mut peer = NetworkPeer::new(self.local.network().clone(), "", "");
        if let Some(claimed) = envelope.origination() {
            peer = peer
                .with_id(claimed.id())
                .with_key_type(claimed.identity().key_type.clone());
        }
        peer.with_sender_identity(sender.address, sender.fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;
    use cloak_net_peers::Fingerprint;
    use cloak_net_primitives::{ManualClock, NetworkTag};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingOutbound {
        sent: Mutex<Vec<Envelope>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl Outbound for RecordingOutbound {
        async fn send(&self, envelope: Envelope) -> Result<(), TransportError> {
            if *self.fail.lock() {
                return Err(TransportError::NotConnected);
            }
            self.sent.lock().push(envelope);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<Envelope>>,
    }

    impl MessageBus for RecordingBus {
        fn publish(&self, envelope: Envelope) {
            self.published.lock().push(envelope);
        }
    }

    struct Harness {
        discovery: Discovery<Arc<ManualClock>>,
        outbound: Arc<RecordingOutbound>,
        bus: Arc<RecordingBus>,
        clock: Arc<ManualClock>,
        state: watch::Sender<ConnectivityState>,
    }

    fn peer(fp: &str) -> NetworkPeer {
        NetworkPeer::new(NetworkTag::default(), format!("addr-{fp}"), fp)
    }

    fn harness(max: usize, seeds: Vec<NetworkPeer>) -> Harness {
        let local = peer("local").with_id("local-id");
        let directory = Arc::new(PeerDirectory::new(
            local.network().clone(),
            local.fingerprint().clone(),
            max,
            seeds,
        ));
        let outbound = Arc::new(RecordingOutbound::default());
        let bus = Arc::new(RecordingBus::default());
        let clock = Arc::new(ManualClock::new(10_000));
        let (state, rx) = watch::channel(ConnectivityState::Connected);

        let discovery = Discovery::new(
            local,
            directory,
            Arc::new(InFlightTracker::new()),
            rx,
            outbound.clone(),
            bus.clone(),
            Arc::clone(&clock),
        );
        Harness {
            discovery,
            outbound,
            bus,
            clock,
            state,
        }
    }

    fn inbound(from: &str, envelope: &Envelope) -> InboundMessage {
        InboundMessage {
            sender: SenderIdentity {
                address: format!("addr-{from}"),
                fingerprint: Fingerprint::from(from),
            },
            payload: EnvelopeCodec.encode(envelope).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_skips_when_not_connected() {
        let h = harness(10, vec![peer("s1")]);
        h.state.send(ConnectivityState::Blocked).unwrap();

        assert_eq!(
            h.discovery.tick().await,
            TickOutcome::Skipped(SkipReason::NotConnected)
        );
        assert!(h.outbound.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_skips_when_full() {
        let h = harness(1, Vec::new());
        h.discovery.directory().add(peer("a"));

        assert_eq!(
            h.discovery.tick().await,
            TickOutcome::Skipped(SkipReason::DirectoryFull)
        );
    }

    #[tokio::test]
    async fn test_empty_directory_queries_every_seed() {
        let h = harness(10, vec![peer("s1"), peer("s2"), peer("local")]);

        let outcome = h.discovery.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Ran {
                timed_out: 0,
                sent: 2,
                failed: 0
            }
        );

        let sent = h.outbound.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(h.discovery.tracker().len(), 2);
        for envelope in sent.iter() {
            assert_eq!(envelope.marker, Some(Marker::DiscoveryRequest));
            assert!(h.discovery.tracker().contains(&envelope.id));
            assert_ne!(envelope.destination().unwrap().fingerprint().as_str(), "local");
        }
        assert_ne!(sent[0].id, sent[1].id);
    }

    #[tokio::test]
    async fn test_known_peers_query_one_random_peer() {
        let h = harness(10, vec![peer("s1")]);
        h.discovery.directory().add_all(vec![peer("a"), peer("b")]);

        h.discovery.tick().await;

        let sent = h.outbound.sent.lock();
        assert_eq!(sent.len(), 1);
        let target = sent[0].destination().unwrap().fingerprint().as_str().to_owned();
        assert!(target == "a" || target == "b");
        assert_eq!(sent[0].peers().len(), 2);
    }

    #[tokio::test]
    async fn test_unanswered_request_swept_next_tick() {
        let h = harness(10, vec![peer("s1")]);

        h.discovery.tick().await;
        let first = h.outbound.sent.lock()[0].id.clone();
        assert!(h.discovery.tracker().contains(&first));

        let outcome = h.discovery.tick().await;
        assert_matches!(outcome, TickOutcome::Ran { timed_out: 1, sent: 1, .. });
        assert!(!h.discovery.tracker().contains(&first));
        assert!(!h.discovery.tracker().remove(&first));
    }

    #[tokio::test]
    async fn test_send_failure_clears_tracker() {
        let h = harness(10, vec![peer("s1"), peer("s2")]);
        *h.outbound.fail.lock() = true;

        let outcome = h.discovery.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Ran {
                timed_out: 0,
                sent: 0,
                failed: 2
            }
        );
        assert!(h.discovery.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_request_from_unknown_peer() {
        let h = harness(10, Vec::new());
        let request = Envelope::discovery_request(peer("p"), peer("local"), vec![peer("q")]);

        let outcome = h.discovery.handle_inbound(inbound("p", &request)).await.unwrap();
        assert_matches!(outcome, InboundOutcome::Request { replied: true, .. });

        let dir = h.discovery.directory();
        assert!(dir.contains(&Fingerprint::from("p")));
        assert!(dir.contains(&Fingerprint::from("q")));

        let sent = h.outbound.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, request.id);
        assert_eq!(sent[0].marker, Some(Marker::DiscoveryResponse));
        assert_eq!(sent[0].destination().unwrap().fingerprint().as_str(), "p");
        assert!(h.discovery.tracker().is_empty());
    }

    #[tokio::test]
    async fn test_response_completes_tracked_request() {
        let h = harness(10, vec![peer("s1")]);
        h.discovery.tick().await;
        let request = h.outbound.sent.lock()[0].clone();

        h.clock.advance(Duration::from_millis(420));
        let response = Envelope::discovery_response(
            request.id.clone(),
            peer("s1"),
            peer("local"),
            vec![peer("x"), peer("local")],
        );
        let outcome = h.discovery.handle_inbound(inbound("s1", &response)).await.unwrap();

        assert_matches!(outcome, InboundOutcome::Response { round_trip: Some(420), merged } => {
            assert_eq!(merged.inserted, 1);
            assert_eq!(merged.rejected, 1);
        });
        assert!(h.discovery.tracker().is_empty());
        assert!(h.discovery.directory().contains(&Fingerprint::from("s1")));
        assert!(h.discovery.directory().contains(&Fingerprint::from("x")));
        assert!(!h.discovery.directory().contains(&Fingerprint::from("local")));
    }

    #[tokio::test]
    async fn test_origination_comes_from_sender_identity() {
        let h = harness(10, Vec::new());
        let spoofed =
            Envelope::discovery_request(peer("victim").with_id("liar"), peer("local"), Vec::new());

        h.discovery.handle_inbound(inbound("real", &spoofed)).await.unwrap();

        let dir = h.discovery.directory();
        assert!(!dir.contains(&Fingerprint::from("victim")));
        let real = dir.get(&Fingerprint::from("real")).unwrap();
        assert_eq!(real.address(), "addr-real");
        assert_eq!(real.id(), "liar");
    }

    #[tokio::test]
    async fn test_application_message_goes_to_bus() {
        let h = harness(10, Vec::new());
        let message = Envelope::application(serde_json::json!({"hello": "world"}));

        let outcome = h.discovery.handle_inbound(inbound("p", &message)).await.unwrap();
        assert_eq!(outcome, InboundOutcome::Application);

        let published = h.bus.published.lock();
        assert_eq!(published.len(), 1);
        assert_eq!(
            published[0].origination().unwrap().fingerprint().as_str(),
            "p"
        );
        assert!(h.discovery.directory().contains(&Fingerprint::from("p")));
        assert!(h.outbound.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_changes_nothing() {
        let h = harness(10, Vec::new());
        let message = InboundMessage {
            sender: SenderIdentity {
                address: "addr-p".to_owned(),
                fingerprint: Fingerprint::from("p"),
            },
            payload: Bytes::from_static(b"{not json"),
        };

        assert_matches!(
            h.discovery.handle_inbound(message).await,
            Err(DiscoveryError::Codec(_))
        );
        assert!(h.discovery.directory().is_empty());
        assert!(h.bus.published.lock().is_empty());
        assert!(h.outbound.sent.lock().is_empty());
    }
}
