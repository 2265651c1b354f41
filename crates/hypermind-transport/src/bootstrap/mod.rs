//! Three-phase bootstrap coordinator.
//!
//! Finding the first peer is the slowest part of joining; everything after
//! it is gossip. Phases run in order and the first success short-circuits:
//!
//! 1. **Cached peers** — retry recently seen addresses from the peer cache.
//! 2. **IPv4 sweep** (opt-in) — probe the public address space in seeded
//!    pseudorandom order until one endpoint completes the handshake.
//! 3. **Substrate backstop** — the rendezvous substrate runs regardless and
//!    keeps accepting inbound connections; exhausting phases 1–2 is not an
//!    error, just patience.

mod cache;
mod feistel;
mod probe;
mod scan;

pub use cache::{now_unix, CachedPeer, PeerCache, PEER_CACHE_LIMIT, PEER_CACHE_VERSION};
pub use feistel::FeistelPermutation;
pub use probe::{probe, probe_heartbeat};
pub use scan::{is_scannable, ScanSequence};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time::{timeout, Instant};
use tracing::{debug, info};

use hypermind_identity::Identity;

use crate::config::TransportConfig;

/// Bootstrap coordinator.
pub struct Bootstrap {
    identity: Arc<Identity>,
    config: TransportConfig,
    cache: PeerCache,
}

impl Bootstrap {
    pub fn new(identity: Arc<Identity>, config: TransportConfig) -> Self {
        let cache = PeerCache::new(config.cache_path.clone(), config.cache_max_age);
        Self {
            identity,
            config,
            cache,
        }
    }

    /// Handle on the peer cache, for periodic persistence of live peers.
    pub fn cache(&self) -> &PeerCache {
        &self.cache
    }

    /// Run the active phases. `Some` carries the first validated
    /// connection; `None` means the substrate backstop is the way in.
    pub async fn run(&self) -> Option<TcpStream> {
        if let Some(ip) = self.config.bootstrap_peer_ip {
            return self.probe_override(ip).await;
        }

        let deadline = Instant::now() + self.config.bootstrap_timeout;

        if self.config.cache_enabled {
            if let Some(stream) = self.try_cached_peers().await {
                info!("bootstrap: connected via peer cache");
                return Some(stream);
            }
        }

        if self.config.scan_enabled {
            if let Some(stream) = self.sweep(deadline).await {
                info!("bootstrap: connected via address sweep");
                return Some(stream);
            }
        }

        debug!("bootstrap: active phases exhausted, waiting on substrate");
        None
    }

    /// Debug override: one handshake probe against a fixed address.
    async fn probe_override(&self, ip: std::net::Ipv4Addr) -> Option<TcpStream> {
        let addr = SocketAddr::from((ip, self.config.scan_port));
        info!(%addr, "bootstrap: probing fixed peer");
        match probe(
            addr,
            &self.identity,
            self.config.scan_connect_timeout,
            self.config.probe_read_timeout,
        )
        .await
        {
            Ok((stream, _)) => Some(stream),
            Err(e) => {
                debug!(%addr, error = %e, "fixed peer probe failed");
                None
            }
        }
    }

    /// Phase 1: plain TCP connects to cached peers, first success wins.
    async fn try_cached_peers(&self) -> Option<TcpStream> {
        let peers = self.cache.load().await;
        if peers.is_empty() {
            return None;
        }
        debug!(count = peers.len(), "bootstrap: retrying cached peers");

        for peer in peers {
            let addr = SocketAddr::from((peer.ip, peer.port));
            match timeout(self.config.cache_connect_timeout, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => {
                    debug!(%addr, "cached peer answered");
                    return Some(stream);
                }
                Ok(Err(e)) => debug!(%addr, error = %e, "cached peer refused"),
                Err(_) => debug!(%addr, "cached peer timed out"),
            }
        }
        None
    }

    /// Phase 2: seeded pseudorandom sweep of the public IPv4 space with
    /// bounded concurrency. Outstanding probes are cancelled on the first
    /// validated peer or at the deadline.
    async fn sweep(&self, deadline: Instant) -> Option<TcpStream> {
        let seed: [u8; 32] = rand::random();
        let mut addrs = ScanSequence::new(FeistelPermutation::from_seed(&seed));
        let mut inflight: JoinSet<Option<TcpStream>> = JoinSet::new();

        let budget = tokio::time::sleep_until(deadline);
        tokio::pin!(budget);

        info!(port = self.config.scan_port, "bootstrap: sweeping for peers");
        loop {
            while inflight.len() < self.config.scan_concurrency {
                let Some(ip) = addrs.next() else { break };
                let addr = SocketAddr::from((ip, self.config.scan_port));
                let identity = self.identity.clone();
                let connect_timeout = self.config.scan_connect_timeout;
                let read_timeout = self.config.probe_read_timeout;
                inflight.spawn(async move {
                    probe(addr, &identity, connect_timeout, read_timeout)
                        .await
                        .ok()
                        .map(|(stream, _)| stream)
                });
            }

            if inflight.is_empty() {
                return None;
            }

            tokio::select! {
                _ = &mut budget => {
                    debug!("bootstrap: sweep deadline reached");
                    inflight.abort_all();
                    return None;
                }
                joined = inflight.join_next() => match joined {
                    Some(Ok(Some(stream))) => {
                        inflight.abort_all();
                        return Some(stream);
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        }
    }
}
