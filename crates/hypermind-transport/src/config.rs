//! Transport and bootstrap configuration.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::DEFAULT_SCAN_PORT;

/// Everything the swarm adapter and bootstrap coordinator need to know.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port the overlay listens on; also the port the sweep probes.
    pub scan_port: u16,

    /// Whether the pseudorandom IPv4 sweep runs at all. Off by default:
    /// unsolicited internet-wide probing is strictly opt-in.
    pub scan_enabled: bool,

    /// Concurrent outstanding probes during the sweep.
    pub scan_concurrency: usize,

    /// Per-probe TCP connect budget during the sweep.
    pub scan_connect_timeout: Duration,

    /// How long a probed endpoint gets to answer the handshake heartbeat.
    pub probe_read_timeout: Duration,

    /// Wall-clock budget for the active bootstrap phases. When it runs out
    /// the node simply waits on the rendezvous substrate.
    pub bootstrap_timeout: Duration,

    /// Whether the peer cache is consulted and written.
    pub cache_enabled: bool,

    /// Location of the peer cache file.
    pub cache_path: PathBuf,

    /// Cached entries older than this are pruned on load.
    pub cache_max_age: Duration,

    /// Per-entry TCP connect budget when retrying cached peers.
    pub cache_connect_timeout: Duration,

    /// Debug override: skip cache and sweep, probe exactly this address.
    pub bootstrap_peer_ip: Option<Ipv4Addr>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scan_port: DEFAULT_SCAN_PORT,
            scan_enabled: false,
            scan_concurrency: 50,
            scan_connect_timeout: Duration::from_millis(300),
            probe_read_timeout: Duration::from_secs(1),
            bootstrap_timeout: Duration::from_secs(30),
            cache_enabled: true,
            cache_path: PathBuf::from("./peers.json"),
            cache_max_age: Duration::from_secs(24 * 60 * 60),
            cache_connect_timeout: Duration::from_millis(500),
            bootstrap_peer_ip: None,
        }
    }
}

impl TransportConfig {
    /// Set the overlay port.
    pub fn with_scan_port(mut self, port: u16) -> Self {
        self.scan_port = port;
        self
    }

    /// Enable or disable the IPv4 sweep.
    pub fn with_scan_enabled(mut self, enabled: bool) -> Self {
        self.scan_enabled = enabled;
        self
    }

    /// Set the peer cache location.
    pub fn with_cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = path;
        self
    }

    /// Set the active-bootstrap budget.
    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }
}
