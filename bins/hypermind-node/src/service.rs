//! Node service: wires identity, swarm, engine, bootstrap, and the
//! dashboard together and owns every background task.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hypermind_gossip::{
    Diagnostics, GossipEngine, Location, DIAGNOSTICS_INTERVAL, HEARTBEAT_INTERVAL,
};
use hypermind_identity::{Identity, NodeId};
use hypermind_transport::bootstrap::{now_unix, CachedPeer};
use hypermind_transport::{Bootstrap, Dht, Swarm, TcpDht};

use crate::api::types::StatsSnapshot;
use crate::broadcast::Broadcaster;
use crate::config::NodeConfig;
use crate::geo::GeoClient;
use crate::history::HistoryLogger;
use crate::{BROADCAST_THROTTLE, SHUTDOWN_GRACE};

/// How often live direct peers are written back to the peer cache.
const CACHE_PERSIST_INTERVAL: Duration = Duration::from_secs(60);

/// Shared opt-in state for location sharing.
#[derive(Default)]
pub struct OptInState {
    opted_in: AtomicBool,
    location: Mutex<Option<Location>>,
}

impl OptInState {
    pub fn opted_in(&self) -> bool {
        self.opted_in.load(Ordering::Relaxed)
    }

    pub fn location(&self) -> Option<Location> {
        self.location.lock().expect("opt-in lock poisoned").clone()
    }

    pub fn set(&self, location: Option<Location>) {
        self.opted_in.store(true, Ordering::Relaxed);
        if location.is_some() {
            *self.location.lock().expect("opt-in lock poisoned") = location;
        }
    }
}

/// Everything a dashboard snapshot needs, cheaply cloneable.
#[derive(Clone)]
pub struct StatsSource {
    engine: Arc<GossipEngine>,
    swarm: Arc<Swarm>,
    diagnostics: Arc<Diagnostics>,
    id: NodeId,
    optin: Arc<OptInState>,
}

impl StatsSource {
    pub fn snapshot(&self) -> StatsSnapshot {
        let peers = self.engine.snapshot();
        StatsSnapshot {
            count: peers.count,
            direct: self.swarm.direct_count(),
            id: self.id.to_string(),
            diagnostics: self.diagnostics.last(),
            locations: peers.locations,
            opted_in: self.optin.opted_in(),
        }
    }
}

/// The running node.
pub struct NodeService {
    config: NodeConfig,
    identity: Arc<Identity>,
    engine: Arc<GossipEngine>,
    swarm: Arc<Swarm>,
    diagnostics: Arc<Diagnostics>,
    broadcaster: Arc<Broadcaster>,
    optin: Arc<OptInState>,
    geo: GeoClient,
    bootstrap: Arc<Bootstrap>,
    overlay_addr: Option<SocketAddr>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NodeService {
    /// Bring up identity, listener, and engine. Fails only on genuinely
    /// fatal conditions (the overlay port cannot be bound).
    pub async fn new(config: NodeConfig) -> Result<Self> {
        info!("generating identity (mining admission nonce)...");
        let started = std::time::Instant::now();
        let identity = Arc::new(Identity::generate());
        info!(
            id = %identity.id(),
            nonce = identity.nonce(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "identity ready"
        );

        let diagnostics = Arc::new(Diagnostics::new());
        let swarm = Arc::new(Swarm::new(diagnostics.clone()));
        let engine = Arc::new(GossipEngine::new(
            identity.clone(),
            swarm.relay(),
            diagnostics.clone(),
            config.max_peers,
        ));

        let dht = Arc::new(
            TcpDht::bind(config.transport.scan_port)
                .await
                .context("binding the overlay port")?,
        );
        let overlay_addr = dht.local_addr();
        swarm.start(dht, engine.clone());

        let bootstrap = Arc::new(Bootstrap::new(identity.clone(), config.transport.clone()));
        let broadcaster = Arc::new(Broadcaster::new(BROADCAST_THROTTLE));

        Ok(Self {
            config,
            identity,
            engine,
            swarm,
            diagnostics,
            broadcaster,
            optin: Arc::new(OptInState::default()),
            geo: GeoClient::new(),
            bootstrap,
            overlay_addr,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn engine(&self) -> &Arc<GossipEngine> {
        &self.engine
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn optin(&self) -> &Arc<OptInState> {
        &self.optin
    }

    pub fn geo(&self) -> &GeoClient {
        &self.geo
    }

    pub fn swarm(&self) -> &Arc<Swarm> {
        &self.swarm
    }

    /// Where the overlay listener actually bound (useful with port 0).
    pub fn overlay_addr(&self) -> Option<SocketAddr> {
        self.overlay_addr
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSource {
        StatsSource {
            engine: self.engine.clone(),
            swarm: self.swarm.clone(),
            diagnostics: self.diagnostics.clone(),
            id: self.identity.id().clone(),
            optin: self.optin.clone(),
        }
    }

    /// Start every background task and serve the dashboard until the
    /// process is told to stop. Only the HTTP bind can fail.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.spawn_heartbeat_tick();
        self.spawn_diagnostics_roll();
        self.spawn_change_forwarder();
        self.spawn_broadcaster();
        self.spawn_bootstrap();
        self.spawn_cache_persistence();
        self.spawn_history();
        self.spawn_startup_optin();

        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding dashboard port {}", self.config.http_port))?;
        info!(%addr, "dashboard listening");

        let router = crate::api::router(crate::api::AppState::from_service(&self));
        axum::serve(listener, router).await.context("dashboard server")?;
        Ok(())
    }

    /// Broadcast the goodbye, give it a moment to flush, then tear down.
    pub async fn shutdown(&self) {
        info!("shutting down: broadcasting goodbye");
        self.engine.leave_all();
        tokio::time::sleep(SHUTDOWN_GRACE).await;

        self.swarm.shutdown();
        for task in self.tasks.lock().expect("service lock poisoned").drain(..) {
            task.abort();
        }
    }

    fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().expect("service lock poisoned").push(task);
    }

    fn spawn_heartbeat_tick(&self) {
        let engine = self.engine.clone();
        self.track(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so seq 1 goes out
            // a full interval after the seq-0 hellos.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.on_tick();
            }
        }));
    }

    fn spawn_diagnostics_roll(&self) {
        let diagnostics = self.diagnostics.clone();
        let broadcaster = self.broadcaster.clone();
        self.track(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(DIAGNOSTICS_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                diagnostics.roll();
                broadcaster.mark_changed();
            }
        }));
    }

    fn spawn_change_forwarder(&self) {
        let engine = self.engine.clone();
        let broadcaster = self.broadcaster.clone();
        self.track(tokio::spawn(async move {
            loop {
                engine.changed().await;
                broadcaster.mark_changed();
            }
        }));
    }

    fn spawn_broadcaster(&self) {
        let broadcaster = self.broadcaster.clone();
        let stats = self.stats();
        self.track(tokio::spawn(async move {
            broadcaster.run(stats).await;
        }));
    }

    fn spawn_bootstrap(&self) {
        let bootstrap = self.bootstrap.clone();
        let swarm = self.swarm.clone();
        let engine = self.engine.clone();
        self.track(tokio::spawn(async move {
            match bootstrap.run().await {
                Some(stream) => {
                    let conn = swarm.adopt(stream, &engine);
                    debug!(conn, "bootstrap connection adopted");
                }
                None => {
                    debug!("no bootstrap connection; relying on inbound peers");
                }
            }
        }));
    }

    /// Periodically remember which direct peers are live, so the next
    /// start can skip straight to them.
    fn spawn_cache_persistence(&self) {
        if !self.config.transport.cache_enabled {
            return;
        }
        let cache = self.bootstrap.cache().clone();
        let swarm = self.swarm.clone();
        let engine = self.engine.clone();
        let scan_port = self.config.transport.scan_port;
        self.track(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CACHE_PERSIST_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;

                let addrs = swarm.connections();
                let pins = engine.pinned();
                let now = now_unix();

                // Peers listen on the shared overlay port, not on the
                // ephemeral port their dial came from.
                let mut fresh: Vec<CachedPeer> = Vec::new();
                for (conn, id) in pins {
                    let Some((_, Some(addr))) = addrs.iter().find(|(c, _)| *c == conn) else {
                        continue;
                    };
                    let std::net::IpAddr::V4(ip) = addr.ip() else {
                        continue;
                    };
                    fresh.push(CachedPeer {
                        ip,
                        port: scan_port,
                        id,
                        last_seen: now,
                    });
                }
                if fresh.is_empty() {
                    continue;
                }

                // Merge with what is already remembered; fresh entries win.
                let mut merged = fresh;
                for old in cache.load().await {
                    if !merged.iter().any(|p| p.id == old.id) {
                        merged.push(old);
                    }
                }
                if let Err(e) = cache.store(merged).await {
                    warn!(error = %e, "failed to persist peer cache");
                }
            }
        }));
    }

    /// Honor a `LOCATION_OPTIN` preset without waiting for the API call.
    fn spawn_startup_optin(&self) {
        if !self.config.location_optin {
            return;
        }
        let geo = self.geo.clone();
        let engine = self.engine.clone();
        let optin = self.optin.clone();
        let broadcaster = self.broadcaster.clone();
        self.track(tokio::spawn(async move {
            let location = match geo.lookup().await {
                Ok(loc) => {
                    engine.set_own_location(loc.clone());
                    Some(loc)
                }
                Err(e) => {
                    warn!(error = %e, "startup location lookup failed");
                    None
                }
            };
            optin.set(location);
            broadcaster.force();
        }));
    }

    fn spawn_history(&self) {
        let Some(path) = self.config.history_path.clone() else {
            return;
        };
        let logger = HistoryLogger::new(path);
        let engine = self.engine.clone();
        let interval = self.config.history_interval;
        self.track(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = logger.append(engine.count()).await {
                    warn!(error = %e, "failed to append history sample");
                }
            }
        }));
    }
}
