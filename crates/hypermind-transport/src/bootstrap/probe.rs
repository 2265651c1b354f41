//! Protocol-level handshake probe.
//!
//! A TCP accept proves nothing; plenty of services listen on any given
//! port. The probe sends one signed heartbeat and requires a well-formed
//! heartbeat back — proof-of-work and signature verified — before treating
//! the endpoint as a peer.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use hypermind_gossip::{LineDecoder, Message, MAX_MESSAGE_SIZE};
use hypermind_identity::{parse_verifying_key, verify_pow, verify_seq_signature, Identity};

use crate::{Error, Result};

/// Build the heartbeat a probe opens with: sequence zero, zero hops.
pub fn probe_heartbeat(identity: &Identity) -> Message {
    Message::Heartbeat {
        id: identity.id().clone(),
        seq: 0,
        hops: 0,
        nonce: identity.nonce(),
        sig: identity.sign_seq(0),
        loc: None,
    }
}

/// Connect to `addr`, exchange heartbeats, and return the validated
/// stream together with the peer's first heartbeat.
///
/// Fails on connect timeout, handshake timeout, or a response that is not
/// a verifiable heartbeat. The caller continues its sweep on any error.
pub async fn probe(
    addr: SocketAddr,
    identity: &Identity,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<(TcpStream, Message)> {
    let mut stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| Error::Timeout(connect_timeout))?
        .map_err(|e| Error::DialFailed(e.to_string()))?;

    stream
        .write_all(&probe_heartbeat(identity).encode_line())
        .await?;

    let msg = timeout(read_timeout, read_first_message(&mut stream))
        .await
        .map_err(|_| Error::Timeout(read_timeout))??;

    validate_probe_response(&msg)?;
    trace!(%addr, peer = %msg.id(), "probe handshake succeeded");
    Ok((stream, msg))
}

async fn read_first_message(stream: &mut TcpStream) -> Result<Message> {
    let mut decoder = LineDecoder::new(MAX_MESSAGE_SIZE);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::RemoteClosed);
        }
        decoder.push(&chunk[..n]);
        while let Some(frame) = decoder.next_frame() {
            match frame {
                Ok(msg) => return Ok(msg),
                Err(e) => return Err(Error::HandshakeRejected(e.to_string())),
            }
        }
    }
}

fn validate_probe_response(msg: &Message) -> Result<()> {
    let Message::Heartbeat { id, seq, nonce, sig, .. } = msg else {
        return Err(Error::HandshakeRejected("expected a heartbeat".into()));
    };
    if !msg.validate() {
        return Err(Error::HandshakeRejected("malformed heartbeat".into()));
    }
    if !verify_pow(id, *nonce) {
        return Err(Error::HandshakeRejected("proof-of-work failed".into()));
    }
    let Some(key) = parse_verifying_key(id) else {
        return Err(Error::HandshakeRejected("unrecoverable key".into()));
    };
    if !verify_seq_signature(&key, *seq, sig) {
        return Err(Error::HandshakeRejected("signature failed".into()));
    }
    Ok(())
}
