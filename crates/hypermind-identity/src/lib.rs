//! Node identity for the hypermind overlay.
//!
//! Every node owns an Ed25519 keypair for the lifetime of the process. The
//! node's wire identifier is the hex encoding of its public key, and the
//! identifier is bound to a small proof-of-work puzzle so that mass identity
//! generation carries a CPU cost.

pub mod id;
pub mod keys;
pub mod pow;

mod error;

pub use error::Error;
pub use id::NodeId;
pub use keys::{parse_verifying_key, seq_message, verify_seq_signature, Keypair};
pub use pow::{mine_nonce, verify_pow};

/// Required hex prefix of `SHA-256(id || decimal(nonce))`.
///
/// Four hex characters means an expected ~65k hashes to mine, a one-time
/// startup cost of a few milliseconds.
pub const POW_PREFIX: &str = "0000";

/// Length of a node identifier in hex characters (32-byte Ed25519 key).
pub const ID_HEX_LEN: usize = 64;

/// Length of a wire signature in hex characters (64-byte Ed25519 signature).
pub const SIG_HEX_LEN: usize = 128;

/// A node's complete identity: keypair, derived identifier, and mined nonce.
///
/// Immutable for the lifetime of the process.
pub struct Identity {
    keypair: Keypair,
    id: NodeId,
    nonce: u64,
}

impl Identity {
    /// Generate a fresh identity: new keypair plus a nonce satisfying
    /// [`POW_PREFIX`].
    ///
    /// The nonce search scans linearly from zero and terminates with
    /// probability 1; there is no failure mode.
    pub fn generate() -> Self {
        let keypair = Keypair::generate();
        let id = keypair.id();
        let nonce = mine_nonce(&id);
        Self { keypair, id, nonce }
    }

    /// The node's wire identifier.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The mined proof-of-work nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Sign the sequence-number domain string `"seq:" + decimal(seq)`.
    ///
    /// Returns the signature as hex. This is the only thing the protocol
    /// ever signs: the signature authenticates the `(id, seq)` pair, not
    /// the rest of the message body.
    pub fn sign_seq(&self, seq: u64) -> String {
        self.keypair.sign_seq(seq)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_identity_satisfies_pow() {
        let identity = Identity::generate();
        assert!(verify_pow(identity.id(), identity.nonce()));
    }

    #[test]
    fn generated_id_has_expected_length() {
        let identity = Identity::generate();
        assert_eq!(identity.id().as_str().len(), ID_HEX_LEN);
    }

    #[test]
    fn signed_seq_verifies_under_own_key() {
        let identity = Identity::generate();
        let sig = identity.sign_seq(42);
        let key = identity.id().verifying_key().unwrap();
        assert!(verify_seq_signature(&key, 42, &sig));
        assert!(!verify_seq_signature(&key, 43, &sig));
    }
}
