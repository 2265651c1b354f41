//! Error types for transport operations.

use std::time::Duration;

use thiserror::Error;

/// Transport layer error.
#[derive(Debug, Error)]
pub enum Error {
    /// Unable to establish a connection (no route, refused).
    #[error("dial failed: {0}")]
    DialFailed(String),

    /// Connection or operation timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A probed endpoint answered, but not with a valid heartbeat.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// Peer closed the connection mid-handshake.
    #[error("remote closed connection")]
    RemoteClosed,

    /// Peer cache file could not be interpreted.
    #[error("peer cache: {0}")]
    Cache(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
