//! Versioned peer cache.
//!
//! A tiny JSON file remembering recently seen peers so a restarted node can
//! rejoin without sweeping or waiting on rendezvous. The cache is advisory:
//! a missing, corrupt, or incompatible file just means an empty phase one.
//! Writes always replace the whole file.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use hypermind_identity::NodeId;

/// Cache format version this build reads and writes.
pub const PEER_CACHE_VERSION: u32 = 1;

/// At most this many entries survive a store.
pub const PEER_CACHE_LIMIT: usize = 100;

/// One remembered peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPeer {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub id: NodeId,
    /// Unix seconds of the last time this peer was live.
    #[serde(rename = "lastSeen")]
    pub last_seen: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PeerCacheFile {
    version: u32,
    /// Unix seconds the file was written.
    timestamp: u64,
    peers: Vec<CachedPeer>,
}

/// Handle on the cache file.
#[derive(Debug, Clone)]
pub struct PeerCache {
    path: PathBuf,
    max_age: Duration,
}

impl PeerCache {
    pub fn new(path: PathBuf, max_age: Duration) -> Self {
        Self { path, max_age }
    }

    /// Load entries younger than the max age, newest first.
    ///
    /// Any problem reading or interpreting the file yields an empty list.
    pub async fn load(&self) -> Vec<CachedPeer> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "no peer cache");
                return Vec::new();
            }
        };

        let file: PeerCacheFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable peer cache");
                return Vec::new();
            }
        };

        if file.version != PEER_CACHE_VERSION {
            warn!(version = file.version, "discarding peer cache with unknown version");
            return Vec::new();
        }

        let now = now_unix();
        let cutoff = now.saturating_sub(self.max_age.as_secs());
        let mut peers: Vec<CachedPeer> = file
            .peers
            .into_iter()
            .filter(|p| p.last_seen >= cutoff)
            .collect();
        peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        peers.truncate(PEER_CACHE_LIMIT);
        peers
    }

    /// Overwrite the cache with the given peers, keeping only the
    /// [`PEER_CACHE_LIMIT`] most recent.
    pub async fn store(&self, mut peers: Vec<CachedPeer>) -> std::io::Result<()> {
        peers.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        peers.truncate(PEER_CACHE_LIMIT);

        let file = PeerCacheFile {
            version: PEER_CACHE_VERSION,
            timestamp: now_unix(),
            peers,
        };
        let json = serde_json::to_vec(&file).expect("cache serialization is infallible");
        tokio::fs::write(&self.path, json).await
    }
}

/// Current time as unix seconds.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time is after the unix epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypermind_identity::Keypair;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> PeerCache {
        PeerCache::new(dir.path().join("peers.json"), Duration::from_secs(86400))
    }

    fn peer(last_seen: u64) -> CachedPeer {
        CachedPeer {
            ip: Ipv4Addr::new(203, 0, 113, 7),
            port: 4977,
            id: Keypair::generate().id(),
            last_seen,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(cache_in(&dir).load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        tokio::fs::write(dir.path().join("peers.json"), b"{ not json")
            .await
            .unwrap();
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn store_then_load_roundtrips() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = now_unix();

        let peers = vec![peer(now), peer(now - 10)];
        cache.store(peers.clone()).await.unwrap();

        let loaded = cache.load().await;
        assert_eq!(loaded, peers);
    }

    #[tokio::test]
    async fn stale_entries_are_pruned_on_load() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = now_unix();

        cache
            .store(vec![peer(now), peer(now - 100_000)])
            .await
            .unwrap();

        let loaded = cache.load().await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].last_seen, now);
    }

    #[tokio::test]
    async fn unknown_version_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let raw = serde_json::json!({
            "version": 2,
            "timestamp": now_unix(),
            "peers": []
        });
        tokio::fs::write(dir.path().join("peers.json"), raw.to_string())
            .await
            .unwrap();
        assert!(cache.load().await.is_empty());
    }

    #[tokio::test]
    async fn store_keeps_only_the_most_recent_hundred() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        let now = now_unix();

        let peers: Vec<CachedPeer> = (0..150).map(|i| peer(now - i)).collect();
        cache.store(peers).await.unwrap();

        let loaded = cache.load().await;
        assert_eq!(loaded.len(), PEER_CACHE_LIMIT);
        // Newest first, oldest fifty gone.
        assert_eq!(loaded[0].last_seen, now);
        assert_eq!(loaded.last().unwrap().last_seen, now - 99);
    }

    #[tokio::test]
    async fn wire_field_is_last_seen_camel_case() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        cache.store(vec![peer(now_unix())]).await.unwrap();

        let raw = tokio::fs::read_to_string(dir.path().join("peers.json"))
            .await
            .unwrap();
        assert!(raw.contains("\"lastSeen\""));
        assert!(raw.contains("\"version\":1"));
    }
}
