//! The gossip state machine.
//!
//! Driven by three inputs: inbound messages from the swarm, the local
//! heartbeat tick, and connection lifecycle events. Outbound traffic goes
//! through the [`Relay`] seam, which the swarm adapter implements; the
//! engine never holds a reference back into the transport.
//!
//! # Admission filter chain
//!
//! Inbound heartbeats pass an ordered chain — syntactic validation,
//! proof-of-work, sequence-duplicate, capacity, signature — and each
//! failure bumps one diagnostics counter and drops the message silently.
//! The duplicate check deliberately runs before signature verification:
//! verify CPU is then bounded by the rate of genuinely new sequences per
//! peer, not by raw gossip volume.
//!
//! # Locking
//!
//! One mutex guards the registry, the local sequence counter, and the
//! socket pins. Holding it across the whole check-sequence,
//! verify-signature, insert sequence is what keeps two concurrent copies of
//! the same heartbeat from both being admitted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tracing::{debug, trace};

use hypermind_identity::{parse_verifying_key, verify_pow, verify_seq_signature, Identity, NodeId};

use crate::diagnostics::{Counter, Diagnostics};
use crate::message::{Location, Message};
use crate::registry::PeerRegistry;
use crate::{MAX_RELAY_HOPS, PEER_TIMEOUT};

/// Identifier the swarm assigns to one direct connection.
pub type ConnId = u64;

/// Outbound seam implemented by the swarm adapter.
///
/// Writes are fire-and-forget: a slow or dead socket loses messages, it
/// never stalls the engine or other peers.
pub trait Relay: Send + Sync + 'static {
    /// Write a line to every direct connection except `except`.
    fn broadcast(&self, line: &[u8], except: Option<ConnId>);

    /// Write a line to a single connection.
    fn send(&self, conn: ConnId, line: &[u8]);
}

/// Peer-set summary handed to the dashboard.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub count: usize,
    pub locations: Vec<Location>,
}

struct EngineState {
    registry: PeerRegistry,
    /// Local sequence counter; incremented on every self-heartbeat.
    seq: u64,
    /// Socket → peer bindings, set once on the first 0-hop heartbeat.
    pins: HashMap<ConnId, NodeId>,
    own_loc: Option<Location>,
}

pub struct GossipEngine {
    identity: Arc<Identity>,
    relay: Arc<dyn Relay>,
    diagnostics: Arc<Diagnostics>,
    state: Mutex<EngineState>,
    changed: Notify,
}

impl GossipEngine {
    pub fn new(
        identity: Arc<Identity>,
        relay: Arc<dyn Relay>,
        diagnostics: Arc<Diagnostics>,
        max_peers: usize,
    ) -> Self {
        let registry = PeerRegistry::new(identity.id().clone(), max_peers);
        Self {
            identity,
            relay,
            diagnostics,
            state: Mutex::new(EngineState {
                registry,
                seq: 0,
                pins: HashMap::new(),
                own_loc: None,
            }),
            changed: Notify::new(),
        }
    }

    /// Process one decoded inbound message from `conn`.
    pub fn handle_message(&self, conn: ConnId, msg: Message) {
        if !msg.validate() {
            self.diagnostics.count(Counter::Malformed);
            return;
        }
        match msg {
            Message::Heartbeat { .. } => self.handle_heartbeat(conn, msg),
            Message::Leave { .. } => self.handle_leave(conn, msg),
        }
    }

    fn handle_heartbeat(&self, conn: ConnId, msg: Message) {
        let Message::Heartbeat {
            ref id,
            seq,
            hops,
            nonce,
            ref sig,
            ref loc,
        } = msg
        else {
            return;
        };
        self.diagnostics.count(Counter::HeartbeatsReceived);

        if !verify_pow(id, nonce) {
            self.diagnostics.count(Counter::InvalidPow);
            trace!(%id, "dropping heartbeat: proof-of-work");
            return;
        }

        {
            let mut st = self.state.lock().expect("engine lock poisoned");

            if let Some(stored) = st.registry.seq_of(id) {
                if seq <= stored {
                    self.diagnostics.count(Counter::DuplicateSeq);
                    return;
                }
            }

            if !st.registry.can_accept(id) {
                trace!(%id, "dropping heartbeat: registry full");
                return;
            }

            // Reconstruct the key on first sight; cached afterwards.
            let key = match st.registry.cached_key(id) {
                Some(key) => key,
                None => match parse_verifying_key(id) {
                    Some(key) => key,
                    None => {
                        self.diagnostics.count(Counter::InvalidSig);
                        return;
                    }
                },
            };

            if !verify_seq_signature(&key, seq, sig) {
                self.diagnostics.count(Counter::InvalidSig);
                debug!(%id, seq, "dropping heartbeat: signature");
                return;
            }

            let was_new = st.registry.add_or_update(id, seq, key, loc.clone());
            if was_new {
                self.diagnostics.count(Counter::NewPeersAdded);
                debug!(%id, seq, "admitted new peer");
                self.changed.notify_one();
            }

            if hops == 0 {
                st.pins.entry(conn).or_insert_with(|| id.clone());
            }
        }

        if hops < MAX_RELAY_HOPS {
            let line = msg.with_incremented_hops().encode_line();
            self.diagnostics.count(Counter::HeartbeatsRelayed);
            self.diagnostics.add(Counter::BytesRelayed, line.len() as u64);
            self.relay.broadcast(&line, Some(conn));
        }
    }

    fn handle_leave(&self, conn: ConnId, msg: Message) {
        let Message::Leave { ref id, hops } = msg else {
            return;
        };
        self.diagnostics.count(Counter::LeaveMessages);

        let removed = {
            let mut st = self.state.lock().expect("engine lock poisoned");
            st.registry.remove(id)
        };

        // An unknown leave is dropped without relay; the hop limit plus
        // duplicate-by-absence is what makes the flood converge.
        if !removed {
            return;
        }
        debug!(%id, "peer left");
        self.changed.notify_one();

        if hops < MAX_RELAY_HOPS {
            let line = msg.with_incremented_hops().encode_line();
            self.diagnostics.add(Counter::BytesRelayed, line.len() as u64);
            self.relay.broadcast(&line, Some(conn));
        }
    }

    /// Heartbeat tick: advance the local sequence, announce it everywhere,
    /// then sweep out stale peers.
    pub fn on_tick(&self) {
        let (line, evicted) = {
            let mut st = self.state.lock().expect("engine lock poisoned");
            st.seq += 1;
            let seq = st.seq;
            let loc = st.own_loc.clone();
            st.registry.touch_local(seq, loc.clone());
            let line = self.self_heartbeat(seq, loc).encode_line();
            let evicted = st.registry.evict_stale(PEER_TIMEOUT);
            (line, evicted)
        };

        self.relay.broadcast(&line, None);

        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted stale peers");
            self.changed.notify_one();
        }
    }

    /// Greet a brand-new direct connection with our current heartbeat, so
    /// the other side converges without waiting for the next tick.
    pub fn hello(&self, conn: ConnId) {
        let line = {
            let st = self.state.lock().expect("engine lock poisoned");
            self.self_heartbeat(st.seq, st.own_loc.clone()).encode_line()
        };
        self.relay.send(conn, &line);
    }

    /// Socket closed: forget the peer pinned to it, if any.
    pub fn on_connection_closed(&self, conn: ConnId) {
        let removed = {
            let mut st = self.state.lock().expect("engine lock poisoned");
            match st.pins.remove(&conn) {
                Some(id) => st.registry.remove(&id),
                None => false,
            }
        };
        if removed {
            self.changed.notify_one();
        }
    }

    /// Best-effort goodbye on shutdown.
    pub fn leave_all(&self) {
        let line = Message::Leave {
            id: self.identity.id().clone(),
            hops: 0,
        }
        .encode_line();
        self.relay.broadcast(&line, None);
    }

    fn self_heartbeat(&self, seq: u64, loc: Option<Location>) -> Message {
        Message::Heartbeat {
            id: self.identity.id().clone(),
            seq,
            hops: 0,
            nonce: self.identity.nonce(),
            sig: self.identity.sign_seq(seq),
            loc,
        }
    }

    /// Attach coordinates to future self-heartbeats.
    pub fn set_own_location(&self, loc: Location) {
        let mut st = self.state.lock().expect("engine lock poisoned");
        st.own_loc = Some(loc.clone());
        let seq = st.seq;
        st.registry.touch_local(seq, Some(loc));
        drop(st);
        self.changed.notify_one();
    }

    /// Wait until the peer set changes.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Current size of the live set, self included.
    pub fn count(&self) -> usize {
        self.state.lock().expect("engine lock poisoned").registry.len()
    }

    /// Peer-set summary for the dashboard.
    pub fn snapshot(&self) -> EngineSnapshot {
        let st = self.state.lock().expect("engine lock poisoned");
        EngineSnapshot {
            count: st.registry.len(),
            locations: st.registry.locations(),
        }
    }

    /// Current socket → peer bindings (for the peer cache).
    pub fn pinned(&self) -> Vec<(ConnId, NodeId)> {
        let st = self.state.lock().expect("engine lock poisoned");
        st.pins.iter().map(|(c, id)| (*c, id.clone())).collect()
    }

    /// Whether `id` currently has a record. Test hook.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.state
            .lock()
            .expect("engine lock poisoned")
            .registry
            .contains(id)
    }

    /// Current local sequence counter. Test hook.
    pub fn seq(&self) -> u64 {
        self.state.lock().expect("engine lock poisoned").seq
    }
}
