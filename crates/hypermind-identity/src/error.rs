//! Error types for identity operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),
}
