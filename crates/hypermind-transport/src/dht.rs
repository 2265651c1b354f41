//! The rendezvous substrate seam.
//!
//! The overlay core treats peer rendezvous as an opaque dependency: join a
//! topic, receive duplex byte-stream connections. Any DHT offering those
//! primitives slots in behind [`Dht`]. The shipped implementation,
//! [`TcpDht`], accepts plain TCP on the overlay port and leaves wide-area
//! rendezvous to the bootstrap coordinator's cache and sweep phases.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::Result;

/// Rendezvous substrate: topic membership plus an inbound connection feed.
#[async_trait]
pub trait Dht: Send + Sync + 'static {
    /// Announce membership in a 32-byte topic.
    async fn join(&self, topic: [u8; 32]) -> Result<()>;

    /// Wait for the next inbound connection. `None` means the substrate
    /// has shut down and no further connections will arrive.
    async fn accept(&self) -> Option<TcpStream>;

    /// The local address connections arrive on, once bound.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// TCP-listener substrate.
pub struct TcpDht {
    listener: TcpListener,
}

impl TcpDht {
    /// Bind the overlay listener on all interfaces.
    ///
    /// A bind failure is fatal to startup; there is no overlay without a
    /// reachable port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(port, "overlay listener bound");
        Ok(Self { listener })
    }

    /// Bind on an ephemeral loopback port. Test hook.
    pub async fn bind_local() -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl Dht for TcpDht {
    async fn join(&self, topic: [u8; 32]) -> Result<()> {
        // Rendezvous is handled out-of-band for this substrate; membership
        // is implied by listening. Recorded for the logs only.
        info!(topic = %hex::encode(topic), "joined swarm topic");
        Ok(())
    }

    async fn accept(&self) -> Option<TcpStream> {
        loop {
            match self.listener.accept().await {
                Ok((stream, remote)) => {
                    tracing::debug!(%remote, "inbound connection");
                    return Some(stream);
                }
                Err(e) => {
                    // Transient accept failures (fd exhaustion, aborted
                    // handshakes) must not kill the feed.
                    warn!(error = %e, "accept failed, continuing");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_local_reports_address() {
        let dht = TcpDht::bind_local().await.unwrap();
        let addr = dht.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn accept_yields_inbound_connections() {
        let dht = TcpDht::bind_local().await.unwrap();
        let addr = dht.local_addr().unwrap();

        let dial = tokio::spawn(async move { TcpStream::connect(addr).await });
        let accepted = dht.accept().await;
        assert!(accepted.is_some());
        assert!(dial.await.unwrap().is_ok());
    }
}
