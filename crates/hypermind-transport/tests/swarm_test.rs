//! End-to-end swarm tests over loopback TCP: two nodes converge on each
//! other, goodbye messages propagate, and a dropped socket unpins its peer.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;

use hypermind_gossip::{Diagnostics, GossipEngine, DEFAULT_MAX_PEERS};
use hypermind_identity::Identity;
use hypermind_transport::{Dht, Swarm, TcpDht};

struct Node {
    identity: Arc<Identity>,
    engine: Arc<GossipEngine>,
    swarm: Arc<Swarm>,
    addr: std::net::SocketAddr,
}

async fn spawn_node() -> Node {
    let identity = Arc::new(Identity::generate());
    let diagnostics = Arc::new(Diagnostics::new());
    let swarm = Arc::new(Swarm::new(diagnostics.clone()));
    let engine = Arc::new(GossipEngine::new(
        identity.clone(),
        swarm.relay(),
        diagnostics,
        DEFAULT_MAX_PEERS,
    ));

    let dht = Arc::new(TcpDht::bind_local().await.unwrap());
    let addr = dht.local_addr().unwrap();
    swarm.start(dht, engine.clone());

    Node {
        identity,
        engine,
        swarm,
        addr,
    }
}

async fn wait_until(deadline: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let end = tokio::time::Instant::now() + deadline;
    while tokio::time::Instant::now() < end {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test]
async fn two_nodes_converge_after_one_dial() {
    let a = spawn_node().await;
    let b = spawn_node().await;

    let stream = TcpStream::connect(b.addr).await.unwrap();
    a.swarm.adopt(stream, &a.engine);

    // Hellos flow both ways on adoption; each side should admit the other.
    assert!(
        wait_until(Duration::from_secs(5), || {
            a.engine.count() == 2 && b.engine.count() == 2
        })
        .await,
        "peers did not converge"
    );

    assert!(a.engine.contains(b.identity.id()));
    assert!(b.engine.contains(a.identity.id()));
    assert_eq!(a.swarm.direct_count(), 1);
    assert_eq!(b.swarm.direct_count(), 1);
}

#[tokio::test]
async fn leave_removes_peer_without_waiting_for_timeout() {
    let a = spawn_node().await;
    let b = spawn_node().await;

    let stream = TcpStream::connect(b.addr).await.unwrap();
    a.swarm.adopt(stream, &a.engine);

    assert!(wait_until(Duration::from_secs(5), || b.engine.count() == 2).await);

    a.engine.leave_all();

    assert!(
        wait_until(Duration::from_secs(2), || b.engine.count() == 1).await,
        "leave did not remove the peer promptly"
    );
}

#[tokio::test]
async fn socket_close_drops_the_pinned_peer() {
    let a = spawn_node().await;
    let b = spawn_node().await;

    let stream = TcpStream::connect(b.addr).await.unwrap();
    a.swarm.adopt(stream, &a.engine);

    assert!(wait_until(Duration::from_secs(5), || b.engine.count() == 2).await);

    // Kill every socket on A without a goodbye.
    a.swarm.shutdown();

    assert!(
        wait_until(Duration::from_secs(5), || b.engine.count() == 1).await,
        "closed socket did not unpin the peer"
    );
    assert_eq!(b.swarm.direct_count(), 0);
}

#[tokio::test]
async fn heartbeat_ticks_keep_peers_fresh() {
    let a = spawn_node().await;
    let b = spawn_node().await;

    let stream = TcpStream::connect(b.addr).await.unwrap();
    a.swarm.adopt(stream, &a.engine);
    assert!(wait_until(Duration::from_secs(5), || b.engine.count() == 2).await);

    // A few manual ticks on each side; sequence numbers advance and both
    // registries keep exactly the two of them.
    for _ in 0..3 {
        a.engine.on_tick();
        b.engine.on_tick();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(a.engine.count(), 2);
    assert_eq!(b.engine.count(), 2);
    assert!(a.engine.seq() >= 3);
}
