//! Ed25519 keypairs and the sequence-number signing domain.
//!
//! The protocol signs exactly one thing: the ASCII string
//! `"seq:" + decimal(seq)`. Hop counts and location payloads travel
//! unauthenticated; integrity of the liveness claim is all the overlay
//! needs.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::NodeId;

/// A node's Ed25519 keypair.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a new random keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// The wire identifier derived from the public key.
    pub fn id(&self) -> NodeId {
        NodeId::from_verifying_key(&self.signing.verifying_key())
    }

    /// The public half of the keypair.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Sign the sequence domain string, returning the signature as hex.
    pub fn sign_seq(&self, seq: u64) -> String {
        let sig = self.signing.sign(seq_message(seq).as_bytes());
        hex::encode(sig.to_bytes())
    }
}

/// The exact byte string covered by a heartbeat signature.
pub fn seq_message(seq: u64) -> String {
    format!("seq:{seq}")
}

/// Reconstruct a peer's public key from its wire identifier.
///
/// Returns `None` for ids that do not encode a valid curve point. Used on
/// first sight of a peer; callers cache the result.
pub fn parse_verifying_key(id: &NodeId) -> Option<VerifyingKey> {
    id.verifying_key().ok()
}

/// Verify a hex signature over `"seq:" + decimal(seq)`.
///
/// Returns `false` on any failure: malformed hex, wrong length, or
/// signature mismatch. Never panics or propagates.
pub fn verify_seq_signature(key: &VerifyingKey, seq: u64, sig_hex: &str) -> bool {
    let Ok(bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(&bytes) else {
        return false;
    };
    key.verify_strict(seq_message(seq).as_bytes(), &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_message_is_ascii_decimal() {
        assert_eq!(seq_message(0), "seq:0");
        assert_eq!(seq_message(1234567), "seq:1234567");
    }

    #[test]
    fn two_keypairs_have_distinct_ids() {
        assert_ne!(Keypair::generate().id(), Keypair::generate().id());
    }

    #[test]
    fn signature_roundtrip() {
        let kp = Keypair::generate();
        let sig = kp.sign_seq(7);
        assert!(verify_seq_signature(&kp.verifying_key(), 7, &sig));
    }

    #[test]
    fn wrong_seq_fails_verification() {
        let kp = Keypair::generate();
        let sig = kp.sign_seq(7);
        assert!(!verify_seq_signature(&kp.verifying_key(), 8, &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = kp.sign_seq(7);
        assert!(!verify_seq_signature(&other.verifying_key(), 7, &sig));
    }

    #[test]
    fn malformed_hex_is_rejected_without_panic() {
        let kp = Keypair::generate();
        assert!(!verify_seq_signature(&kp.verifying_key(), 7, "not hex"));
        assert!(!verify_seq_signature(&kp.verifying_key(), 7, "abcd"));
        assert!(!verify_seq_signature(&kp.verifying_key(), 7, ""));
    }
}
