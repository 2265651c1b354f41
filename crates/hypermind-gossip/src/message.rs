//! Wire message model.
//!
//! Two message kinds flood the overlay, both as single-line minified JSON:
//!
//! ```text
//! {"type":"HEARTBEAT","id":<hex>,"seq":<uint>,"hops":<0..2>,"nonce":<uint>,"sig":<hex>,"loc":{...}?}
//! {"type":"LEAVE","id":<hex>,"hops":<0..2>}
//! ```
//!
//! Deserialization enforces the structural contract (tag, id format,
//! non-negative integers); [`Message::validate`] covers what serde cannot
//! express.

use serde::{Deserialize, Serialize};

use hypermind_identity::{NodeId, SIG_HEX_LEN};

/// Optional self-reported coordinates attached to a heartbeat.
///
/// Unauthenticated, like the hop count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub city: String,
}

impl Location {
    /// Coordinates must be finite numbers; JSON cannot carry NaN but a
    /// lenient parser upstream might.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }
}

/// A single gossip message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        id: NodeId,
        seq: u64,
        hops: u8,
        nonce: u64,
        sig: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        loc: Option<Location>,
    },
    #[serde(rename = "LEAVE")]
    Leave { id: NodeId, hops: u8 },
}

impl Message {
    /// The semantic checks serde leaves open: signature is hex of the right
    /// length, location coordinates are finite.
    pub fn validate(&self) -> bool {
        match self {
            Message::Heartbeat { sig, loc, .. } => {
                sig.len() == SIG_HEX_LEN
                    && sig.bytes().all(|b| b.is_ascii_hexdigit())
                    && loc.as_ref().is_none_or(Location::is_valid)
            }
            Message::Leave { .. } => true,
        }
    }

    /// The sender's id, whichever variant.
    pub fn id(&self) -> &NodeId {
        match self {
            Message::Heartbeat { id, .. } | Message::Leave { id, .. } => id,
        }
    }

    /// Hop count as carried on the wire.
    pub fn hops(&self) -> u8 {
        match self {
            Message::Heartbeat { hops, .. } | Message::Leave { hops, .. } => *hops,
        }
    }

    /// Returns a copy with the hop count incremented, for relaying.
    pub fn with_incremented_hops(&self) -> Self {
        let mut msg = self.clone();
        match &mut msg {
            Message::Heartbeat { hops, .. } | Message::Leave { hops, .. } => *hops += 1,
        }
        msg
    }

    /// Encode as one newline-terminated minified JSON line.
    pub fn encode_line(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).expect("message serialization is infallible");
        line.push(b'\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypermind_identity::Identity;

    fn heartbeat(identity: &Identity, seq: u64) -> Message {
        Message::Heartbeat {
            id: identity.id().clone(),
            seq,
            hops: 0,
            nonce: identity.nonce(),
            sig: identity.sign_seq(seq),
            loc: None,
        }
    }

    #[test]
    fn heartbeat_roundtrips_through_json() {
        let identity = Identity::generate();
        let msg = heartbeat(&identity, 3);
        let line = msg.encode_line();
        let parsed: Message = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn wire_field_names_match_protocol() {
        let identity = Identity::generate();
        let json = serde_json::to_value(heartbeat(&identity, 1)).unwrap();
        assert_eq!(json["type"], "HEARTBEAT");
        for field in ["id", "seq", "hops", "nonce", "sig"] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert!(json.get("loc").is_none(), "absent loc must be omitted");
    }

    #[test]
    fn leave_omits_heartbeat_fields() {
        let identity = Identity::generate();
        let json = serde_json::to_value(Message::Leave {
            id: identity.id().clone(),
            hops: 0,
        })
        .unwrap();
        assert_eq!(json["type"], "LEAVE");
        assert!(json.get("seq").is_none());
        assert!(json.get("sig").is_none());
    }

    #[test]
    fn negative_seq_fails_to_parse() {
        let id = "ab".repeat(32);
        let raw = format!(
            r#"{{"type":"HEARTBEAT","id":"{id}","seq":-1,"hops":0,"nonce":0,"sig":"{}"}}"#,
            "0".repeat(128)
        );
        assert!(serde_json::from_str::<Message>(&raw).is_err());
    }

    #[test]
    fn unknown_type_fails_to_parse() {
        let id = "ab".repeat(32);
        let raw = format!(r#"{{"type":"PING","id":"{id}","hops":0}}"#);
        assert!(serde_json::from_str::<Message>(&raw).is_err());
    }

    #[test]
    fn short_id_fails_to_parse() {
        let raw = r#"{"type":"LEAVE","id":"abcd","hops":0}"#;
        assert!(serde_json::from_str::<Message>(raw).is_err());
    }

    #[test]
    fn validate_rejects_bad_signature_encoding() {
        let identity = Identity::generate();
        let mut msg = heartbeat(&identity, 1);
        if let Message::Heartbeat { sig, .. } = &mut msg {
            *sig = "zz".repeat(64);
        }
        assert!(!msg.validate());
    }

    #[test]
    fn validate_rejects_short_signature() {
        let identity = Identity::generate();
        let mut msg = heartbeat(&identity, 1);
        if let Message::Heartbeat { sig, .. } = &mut msg {
            sig.truncate(10);
        }
        assert!(!msg.validate());
    }

    #[test]
    fn incremented_hops_leaves_original_untouched() {
        let identity = Identity::generate();
        let msg = heartbeat(&identity, 1);
        let relayed = msg.with_incremented_hops();
        assert_eq!(msg.hops(), 0);
        assert_eq!(relayed.hops(), 1);
    }
}
