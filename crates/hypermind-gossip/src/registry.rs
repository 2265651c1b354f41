//! In-memory registry of live peers.
//!
//! The registry is the node's answer to "how many of us are there": its
//! cardinality is the count the dashboard displays. Entries are created on
//! first admitted heartbeat and die by explicit leave, staleness, or the
//! closing of the socket they were pinned to.
//!
//! # Capacity
//!
//! Capacity is enforced purely at admission: once full, new ids are refused
//! until staleness frees space. There is no LRU. Under steady state the
//! liveness timers self-regulate; the ceiling only bounds memory.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ed25519_dalek::VerifyingKey;

use hypermind_identity::NodeId;

use crate::message::Location;

/// What the node knows about one live peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Last accepted sequence number; strictly increasing per peer.
    pub seq: u64,

    /// When the last heartbeat from this peer was accepted.
    pub last_seen: Instant,

    /// Verified public key, cached on first admission so later heartbeats
    /// skip key reconstruction.
    pub key: Option<VerifyingKey>,

    /// Self-reported coordinates, if the peer opted in.
    pub loc: Option<Location>,
}

/// Bounded map of live peers, keyed by node id.
///
/// The local node always has a record of its own; it is refreshed on every
/// self-heartbeat and is exempt from eviction and removal.
pub struct PeerRegistry {
    peers: HashMap<NodeId, PeerRecord>,
    local_id: NodeId,
    max_peers: usize,
}

impl PeerRegistry {
    /// Create a registry seeded with the local node's own record at seq 0.
    pub fn new(local_id: NodeId, max_peers: usize) -> Self {
        let mut peers = HashMap::new();
        peers.insert(
            local_id.clone(),
            PeerRecord {
                seq: 0,
                last_seen: Instant::now(),
                key: None,
                loc: None,
            },
        );
        Self {
            peers,
            local_id,
            max_peers,
        }
    }

    /// Whether a heartbeat from `id` is worth verifying at all: the id is
    /// already known, or there is room for one more.
    ///
    /// Advisory and cheap; consulted before signature verification so a
    /// flood of unknown ids costs hashing, not curve operations.
    pub fn can_accept(&self, id: &NodeId) -> bool {
        self.peers.contains_key(id) || self.peers.len() < self.max_peers
    }

    /// Last accepted sequence number for `id`, if known.
    pub fn seq_of(&self, id: &NodeId) -> Option<u64> {
        self.peers.get(id).map(|r| r.seq)
    }

    /// Cached verified key for `id`, if one was admitted before.
    pub fn cached_key(&self, id: &NodeId) -> Option<VerifyingKey> {
        self.peers.get(id).and_then(|r| r.key)
    }

    /// Insert or update a peer after the caller has verified monotonicity
    /// and signature. Returns `true` when the id was not known before.
    ///
    /// Re-application with the same `(id, seq)` changes nothing but
    /// `last_seen`.
    pub fn add_or_update(
        &mut self,
        id: &NodeId,
        seq: u64,
        key: VerifyingKey,
        loc: Option<Location>,
    ) -> bool {
        match self.peers.get_mut(id) {
            Some(record) => {
                record.seq = seq;
                record.last_seen = Instant::now();
                record.key.get_or_insert(key);
                if loc.is_some() {
                    record.loc = loc;
                }
                false
            }
            None => {
                self.peers.insert(
                    id.clone(),
                    PeerRecord {
                        seq,
                        last_seen: Instant::now(),
                        key: Some(key),
                        loc,
                    },
                );
                true
            }
        }
    }

    /// Refresh the local record on a self-heartbeat.
    pub fn touch_local(&mut self, seq: u64, loc: Option<Location>) {
        let record = self
            .peers
            .entry(self.local_id.clone())
            .or_insert_with(|| PeerRecord {
                seq,
                last_seen: Instant::now(),
                key: None,
                loc: None,
            });
        record.seq = seq;
        record.last_seen = Instant::now();
        record.loc = loc;
    }

    /// Remove a peer. Idempotent; the local record is never removed.
    ///
    /// Returns `true` if a record was actually deleted.
    pub fn remove(&mut self, id: &NodeId) -> bool {
        if *id == self.local_id {
            return false;
        }
        self.peers.remove(id).is_some()
    }

    /// Drop every peer whose last accepted heartbeat is older than
    /// `timeout`. The local record is exempt. Returns the evicted ids.
    pub fn evict_stale(&mut self, timeout: Duration) -> Vec<NodeId> {
        let local = self.local_id.clone();
        let mut evicted = Vec::new();
        self.peers.retain(|id, record| {
            if *id == local || record.last_seen.elapsed() <= timeout {
                true
            } else {
                evicted.push(id.clone());
                false
            }
        });
        evicted
    }

    /// Current cardinality, local node included. This is the "Active
    /// Nodes" figure.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Known peer locations (self included when set), for the dashboard.
    pub fn locations(&self) -> Vec<Location> {
        self.peers.values().filter_map(|r| r.loc.clone()).collect()
    }

    /// Whether an id currently has a record.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.contains_key(id)
    }
}
