//! Bounded, deduplicated set of known peers.

use std::collections::{HashMap, HashSet};

use cloak_net_primitives::NetworkTag;
use metrics::gauge;
use parking_lot::Mutex;
use rand::seq::IteratorRandom;
use tracing::{debug, trace};

use crate::error::DirectoryError;
use crate::peer::{Fingerprint, NetworkPeer};

/// Default upper bound on known peers.
pub const DEFAULT_MAX_PEERS: usize = 100;

/// Result of adding a single peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// Existing record replaced, last write wins.
    Updated,
    /// At capacity, new fingerprint rejected.
    Full,
    /// The local node's own fingerprint.
    LocalPeer,
    /// Record carries no fingerprint.
    Invalid,
    /// Record belongs to another overlay.
    ForeignNetwork,
}

impl AddOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

/// Counts from merging a batch of peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: usize,
}

/// Known peers of one overlay keyed by fingerprint, plus the immutable seed set.
///
/// The local node and peers tagged for other overlays are never stored. Once
/// `max_peers` is reached, new fingerprints are rejected while existing ones
/// can still be refreshed.
#[derive(Debug)]
pub struct PeerDirectory {
    network: NetworkTag,
    local: Fingerprint,
    max_peers: usize,
    known: Mutex<HashMap<Fingerprint, NetworkPeer>>,
    seeds: HashMap<Fingerprint, NetworkPeer>,
}

impl PeerDirectory {
    pub fn new(
        network: NetworkTag,
        local: Fingerprint,
        max_peers: usize,
        seeds: impl IntoIterator<Item = NetworkPeer>,
    ) -> Self {
        let seeds = seeds
            .into_iter()
            .filter(|seed| {
                seed.is_valid() && seed.network() == &network && seed.fingerprint() != &local
            })
            .map(|seed| (seed.fingerprint().clone(), seed))
            .collect();

        Self {
            network,
            local,
            max_peers,
            known: Mutex::new(HashMap::new()),
            seeds,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_peers
    }

    pub fn add(&self, peer: NetworkPeer) -> AddOutcome {
        let mut known = self.known.lock();
        let outcome = self.insert_locked(&mut known, peer);
        if outcome.is_stored() {
            gauge!("cloak_directory_known_peers").set(known.len() as f64);
        }
        outcome
    }

    /// Add every peer in `peers`. A fingerprint repeated within the batch is
    /// counted once; the later record wins.
    pub fn add_all(&self, peers: impl IntoIterator<Item = NetworkPeer>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut seen = HashSet::new();
        let mut known = self.known.lock();

        for peer in peers {
            let repeat = !seen.insert(peer.fingerprint().clone());
            match self.insert_locked(&mut known, peer) {
                _ if repeat => {}
                AddOutcome::Inserted => summary.inserted += 1,
                AddOutcome::Updated => summary.updated += 1,
                AddOutcome::Full
                | AddOutcome::LocalPeer
                | AddOutcome::Invalid
                | AddOutcome::ForeignNetwork => summary.rejected += 1,
            }
        }

        gauge!("cloak_directory_known_peers").set(known.len() as f64);
        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected,
            total = known.len(),
            "merged peers"
        );
        summary
    }

    fn insert_locked(
        &self,
        known: &mut HashMap<Fingerprint, NetworkPeer>,
        peer: NetworkPeer,
    ) -> AddOutcome {
        if !peer.is_valid() {
            return AddOutcome::Invalid;
        }
        if peer.network() != &self.network {
            trace!(peer = %peer, network = %self.network, "peer from another overlay, rejecting");
            return AddOutcome::ForeignNetwork;
        }
        if peer.fingerprint() == &self.local {
            return AddOutcome::LocalPeer;
        }
        if let Some(existing) = known.get_mut(peer.fingerprint()) {
            *existing = peer;
            return AddOutcome::Updated;
        }
        if known.len() >= self.max_peers {
            trace!(peer = %peer, "directory full, rejecting peer");
            return AddOutcome::Full;
        }
        known.insert(peer.fingerprint().clone(), peer);
        AddOutcome::Inserted
    }

    /// A uniformly random known peer.
    pub fn random_known_peer(&self) -> Result<NetworkPeer, DirectoryError> {
        self.known
            .lock()
            .values()
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(DirectoryError::EmptyDirectory)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<NetworkPeer> {
        self.known.lock().get(fingerprint).cloned()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.known.lock().contains_key(fingerprint)
    }

    pub fn count(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.max_peers
    }

    pub fn known_peers(&self) -> Vec<NetworkPeer> {
        self.known.lock().values().cloned().collect()
    }

    pub fn seeds(&self) -> Vec<NetworkPeer> {
        self.seeds.values().cloned().collect()
    }

    pub fn clear(&self) {
        self.known.lock().clear();
        gauge!("cloak_directory_known_peers").set(0.0);
    }

    /// Copy the seeds into an empty directory, stamped with `local_id`.
    ///
    /// Returns the number of seeds added, zero if peers were already known.
    /// Once this has run, a discovery tick sees a non-empty directory and
    /// queries one random known peer, which may be any of the seeds.
    pub fn bootstrap_seeds(&self, local_id: &str) -> usize {
        let mut known = self.known.lock();
        if !known.is_empty() {
            return 0;
        }

        let mut added = 0;
        for seed in self.seeds.values() {
            let seed = seed.clone().with_id(local_id);
            if self.insert_locked(&mut known, seed).is_stored() {
                added += 1;
            }
        }

        gauge!("cloak_directory_known_peers").set(known.len() as f64);
        debug!(added, "bootstrapped directory from seeds");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(fp: &str) -> NetworkPeer {
        NetworkPeer::new(NetworkTag::default(), format!("addr-{fp}"), fp)
    }

    fn directory(max: usize) -> PeerDirectory {
        PeerDirectory::new(NetworkTag::default(), Fingerprint::from("local"), max, Vec::new())
    }

    #[test]
    fn test_add_and_last_write_wins() {
        let dir = directory(10);

        assert_eq!(dir.add(peer("a")), AddOutcome::Inserted);
        let renamed = NetworkPeer::new(NetworkTag::default(), "new-addr", "a");
        assert_eq!(dir.add(renamed), AddOutcome::Updated);

        assert_eq!(dir.count(), 1);
        let stored = dir.get(&Fingerprint::from("a")).unwrap();
        assert_eq!(stored.address(), "new-addr");
    }

    #[test]
    fn test_capacity_rejects_new_fingerprints() {
        let dir = directory(2);

        assert_eq!(dir.add(peer("a")), AddOutcome::Inserted);
        assert_eq!(dir.add(peer("b")), AddOutcome::Inserted);
        assert!(dir.is_full());
        assert_eq!(dir.add(peer("c")), AddOutcome::Full);

        // Refreshing an existing entry is still allowed at capacity.
        assert_eq!(dir.add(peer("a")), AddOutcome::Updated);
        assert_eq!(dir.count(), 2);
        assert!(!dir.contains(&Fingerprint::from("c")));
    }

    #[test]
    fn test_local_and_invalid_never_stored() {
        let dir = directory(10);

        assert_eq!(dir.add(peer("local")), AddOutcome::LocalPeer);
        assert_eq!(dir.add(peer("")), AddOutcome::Invalid);
        assert!(dir.is_empty());
    }

    #[test]
    fn test_foreign_network_rejected() {
        let dir = directory(10);
        let elsewhere = NetworkPeer::new(NetworkTag::new("tor"), "addr-tor", "t");

        assert_eq!(dir.add(elsewhere.clone()), AddOutcome::ForeignNetwork);
        let summary = dir.add_all(vec![elsewhere, peer("a")]);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.rejected, 1);

        assert!(!dir.contains(&Fingerprint::from("t")));
        assert_eq!(dir.random_known_peer().unwrap().network(), &NetworkTag::default());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let dir = directory(10);
        let batch = vec![peer("a"), peer("b"), peer("a"), peer("local")];

        let first = dir.add_all(batch.clone());
        assert_eq!(first.inserted, 2);
        assert_eq!(first.rejected, 1);
        let mut before: Vec<_> = dir.known_peers();
        before.sort_by(|x, y| x.fingerprint().cmp(y.fingerprint()));

        let second = dir.add_all(batch);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        let mut after: Vec<_> = dir.known_peers();
        after.sort_by(|x, y| x.fingerprint().cmp(y.fingerprint()));

        assert_eq!(before, after);
    }

    #[test]
    fn test_random_known_peer() {
        let dir = directory(10);
        assert_eq!(dir.random_known_peer(), Err(DirectoryError::EmptyDirectory));

        dir.add(peer("a"));
        dir.add(peer("b"));
        let picked = dir.random_known_peer().unwrap();
        assert!(dir.contains(picked.fingerprint()));
    }

    #[test]
    fn test_seeds_exclude_self() {
        let elsewhere = NetworkPeer::new(NetworkTag::new("tor"), "addr-tor", "seed-tor");
        let dir = PeerDirectory::new(
            NetworkTag::default(),
            Fingerprint::from("local"),
            10,
            vec![peer("seed-1"), peer("local"), peer(""), elsewhere],
        );

        let seeds = dir.seeds();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].fingerprint().as_str(), "seed-1");
    }

    #[test]
    fn test_bootstrap_seeds_only_when_empty() {
        let dir = PeerDirectory::new(
            NetworkTag::default(),
            Fingerprint::from("local"),
            10,
            vec![peer("seed-1"), peer("seed-2")],
        );

        assert_eq!(dir.bootstrap_seeds("node-7"), 2);
        assert_eq!(dir.count(), 2);
        assert_eq!(dir.get(&Fingerprint::from("seed-1")).unwrap().id(), "node-7");

        assert_eq!(dir.bootstrap_seeds("node-7"), 0);
    }

    #[test]
    fn test_clear() {
        let dir = directory(10);
        dir.add_all(vec![peer("a"), peer("b")]);
        dir.clear();
        assert!(dir.is_empty());
    }
}
