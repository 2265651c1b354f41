//! Transport layer for the hypermind overlay.
//!
//! The overlay core consumes the rendezvous substrate through the [`Dht`]
//! trait: join a topic, receive duplex byte-stream connections. The
//! [`Swarm`] adapter owns connection lifetimes, attaches the line codec,
//! and implements the engine's outbound [`Relay`] seam. The bootstrap
//! coordinator produces the first connection faster than rendezvous alone
//! would: cached peers, then an optional pseudorandom IPv4 sweep, with the
//! substrate as the unconditional backstop.

pub mod bootstrap;
pub mod config;
pub mod dht;
pub mod swarm;

mod error;

pub use bootstrap::{Bootstrap, FeistelPermutation, PeerCache, ScanSequence};
pub use config::TransportConfig;
pub use dht::{Dht, TcpDht};
pub use error::Error;
pub use swarm::Swarm;

use sha2::{Digest, Sha256};

/// Rendezvous topic string for this overlay generation.
pub const SWARM_TOPIC_NAME: &str = "hypermind-lklynet-v1";

/// Default port the overlay listens on and sweeps for.
pub const DEFAULT_SCAN_PORT: u16 = 4977;

/// The 32-byte rendezvous topic: `SHA-256(SWARM_TOPIC_NAME)`.
pub fn swarm_topic() -> [u8; 32] {
    let digest = Sha256::digest(SWARM_TOPIC_NAME.as_bytes());
    digest.into()
}

pub type Result<T> = std::result::Result<T, Error>;
