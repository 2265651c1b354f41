//! The swarm adapter: connection ownership and the relay seam.
//!
//! One writer task and one reader task per connection. Writers drain an
//! unbounded queue and drop the connection on write failure; readers feed
//! the line decoder and hand decoded messages to the gossip engine. A
//! blocked or dead peer therefore never stalls the engine or other peers —
//! the overlay accepts message loss as normal.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use hypermind_gossip::diagnostics::Counter;
use hypermind_gossip::{ConnId, Diagnostics, GossipEngine, LineDecoder, Relay, MAX_MESSAGE_SIZE};

use crate::dht::Dht;
use crate::swarm_topic;

struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    remote: Option<SocketAddr>,
    /// Set just after spawn; the reader may have already finished and
    /// cleaned up its own entry by then.
    reader: Option<JoinHandle<()>>,
    writer: JoinHandle<()>,
}

struct SwarmInner {
    connections: Mutex<HashMap<ConnId, ConnectionHandle>>,
    next_conn_id: AtomicU64,
    diagnostics: Arc<Diagnostics>,
}

impl Relay for SwarmInner {
    fn broadcast(&self, line: &[u8], except: Option<ConnId>) {
        let conns = self.connections.lock().expect("swarm lock poisoned");
        for (id, handle) in conns.iter() {
            if Some(*id) == except {
                continue;
            }
            // Fire-and-forget: a closed queue means the connection is
            // already on its way out.
            let _ = handle.tx.send(line.to_vec());
        }
    }

    fn send(&self, conn: ConnId, line: &[u8]) {
        let conns = self.connections.lock().expect("swarm lock poisoned");
        if let Some(handle) = conns.get(&conn) {
            let _ = handle.tx.send(line.to_vec());
        }
    }
}

/// Owns every direct connection and the substrate accept loop.
pub struct Swarm {
    inner: Arc<SwarmInner>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl Swarm {
    pub fn new(diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            inner: Arc::new(SwarmInner {
                connections: Mutex::new(HashMap::new()),
                next_conn_id: AtomicU64::new(1),
                diagnostics,
            }),
            accept_task: Mutex::new(None),
        }
    }

    /// The outbound seam handed to the gossip engine.
    pub fn relay(&self) -> Arc<dyn Relay> {
        self.inner.clone()
    }

    /// Join the swarm topic and start feeding substrate connections into
    /// the engine.
    pub fn start(&self, dht: Arc<dyn Dht>, engine: Arc<GossipEngine>) {
        let inner = self.inner.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = dht.join(swarm_topic()).await {
                tracing::warn!(error = %e, "substrate join failed; accepting inbound only");
            }
            while let Some(stream) = dht.accept().await {
                Self::adopt_stream(&inner, stream, &engine);
            }
            debug!("substrate connection feed ended");
        });
        *self.accept_task.lock().expect("swarm lock poisoned") = Some(task);
    }

    /// Take ownership of a connection produced outside the substrate
    /// (bootstrap cache retry or sweep probe).
    pub fn adopt(&self, stream: TcpStream, engine: &Arc<GossipEngine>) -> ConnId {
        Self::adopt_stream(&self.inner, stream, engine)
    }

    fn adopt_stream(
        inner: &Arc<SwarmInner>,
        stream: TcpStream,
        engine: &Arc<GossipEngine>,
    ) -> ConnId {
        let conn = inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let remote = stream.peer_addr().ok();
        let (mut read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let writer = tokio::spawn(async move {
            while let Some(buf) = rx.recv().await {
                if write_half.write_all(&buf).await.is_err() {
                    // The reader will observe the same failure and run the
                    // cleanup; just stop draining.
                    break;
                }
            }
        });

        // Register before the reader starts so its cleanup always finds
        // the entry.
        inner.connections.lock().expect("swarm lock poisoned").insert(
            conn,
            ConnectionHandle {
                tx,
                remote,
                reader: None,
                writer,
            },
        );

        let reader = {
            let inner = inner.clone();
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut decoder = LineDecoder::new(MAX_MESSAGE_SIZE);
                let mut chunk = vec![0u8; 4096];
                loop {
                    match read_half.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            inner.diagnostics.add(Counter::BytesReceived, n as u64);
                            decoder.push(&chunk[..n]);
                            while let Some(frame) = decoder.next_frame() {
                                match frame {
                                    Ok(msg) => engine.handle_message(conn, msg),
                                    Err(e) => {
                                        trace!(conn, error = %e, "dropped frame");
                                        inner.diagnostics.count(Counter::Malformed);
                                    }
                                }
                            }
                        }
                    }
                }
                if let Some(handle) =
                    inner.connections.lock().expect("swarm lock poisoned").remove(&conn)
                {
                    handle.writer.abort();
                }
                engine.on_connection_closed(conn);
                debug!(conn, "connection closed");
            })
        };

        if let Some(handle) = inner
            .connections
            .lock()
            .expect("swarm lock poisoned")
            .get_mut(&conn)
        {
            handle.reader = Some(reader);
        }
        debug!(conn, ?remote, "connection adopted");

        engine.hello(conn);
        conn
    }

    /// Number of open direct connections.
    pub fn direct_count(&self) -> usize {
        self.inner.connections.lock().expect("swarm lock poisoned").len()
    }

    /// Snapshot of open connections and their remote addresses.
    pub fn connections(&self) -> Vec<(ConnId, Option<SocketAddr>)> {
        self.inner
            .connections
            .lock()
            .expect("swarm lock poisoned")
            .iter()
            .map(|(id, h)| (*id, h.remote))
            .collect()
    }

    /// Stop accepting and tear down every connection.
    pub fn shutdown(&self) {
        if let Some(task) = self.accept_task.lock().expect("swarm lock poisoned").take() {
            task.abort();
        }
        let mut conns = self.inner.connections.lock().expect("swarm lock poisoned");
        for (_, handle) in conns.drain() {
            if let Some(reader) = handle.reader {
                reader.abort();
            }
            handle.writer.abort();
        }
    }
}

impl Drop for Swarm {
    fn drop(&mut self) {
        self.shutdown();
    }
}
