//! Node identifier derivation and validation.
//!
//! A node id is the lowercase hex encoding of its 32-byte Ed25519 public
//! key. The id doubles as the peer key on the wire and as the input to the
//! proof-of-work puzzle, so the exact string (including case) matters: the
//! hash is computed over the id as transmitted.

use ed25519_dalek::VerifyingKey;

use crate::{Error, ID_HEX_LEN};

/// A validated node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct NodeId(String);

impl NodeId {
    /// Parses a node id, requiring exactly [`ID_HEX_LEN`] hex characters.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.len() != ID_HEX_LEN {
            return Err(Error::InvalidNodeId(format!(
                "must be {} hex characters, got {}",
                ID_HEX_LEN,
                s.len()
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidNodeId("non-hex character".to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Derives the id from a public key.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self(hex::encode(key.as_bytes()))
    }

    /// Reconstructs the public key this id encodes.
    ///
    /// Fails if the bytes do not form a valid Ed25519 point.
    pub fn verifying_key(&self) -> Result<VerifyingKey, Error> {
        let bytes = hex::decode(&self.0).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("wrong key length".to_string()))?;
        VerifyingKey::from_bytes(&arr).map_err(|e| Error::InvalidKey(e.to_string()))
    }

    /// Returns the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> serde::Deserialize<'de> for NodeId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
