//! Gossip protocol core for the hypermind overlay.
//!
//! A node's view of the swarm is the set of peers from which it has recently
//! accepted a signed, sequenced heartbeat. This crate owns that view: the
//! wire message model and line codec, the bounded peer registry, the relay
//! engine with its admission filter chain, and the protocol-health counters.

pub mod codec;
pub mod diagnostics;
pub mod engine;
pub mod message;
pub mod registry;

pub use codec::{DecodeError, LineDecoder};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot};
pub use engine::{ConnId, EngineSnapshot, GossipEngine, Relay};
pub use message::{Location, Message};
pub use registry::{PeerRecord, PeerRegistry};

use std::time::Duration;

/// Interval between self-heartbeat emissions.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// A peer with no accepted heartbeat for this long is evicted.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(15);

/// Messages carrying this many hops or more are never relayed further.
pub const MAX_RELAY_HOPS: u8 = 2;

/// Maximum bytes per wire line, including the JSON body.
pub const MAX_MESSAGE_SIZE: usize = 2048;

/// Default ceiling on registry size.
pub const DEFAULT_MAX_PEERS: usize = 1_000_000;

/// Window over which diagnostics counters accumulate before resetting.
pub const DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(10);
