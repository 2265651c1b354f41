//! Protocol-health counters.
//!
//! Counters accumulate over a fixed window and are swapped out on each
//! roll; the dashboard always shows the last completed window, so the
//! displayed figures are per-window rates, not lifetime totals. Updates are
//! relaxed atomics: counts may be touched from any task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;

/// Which filter or throughput counter to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Heartbeats that passed syntactic validation.
    HeartbeatsReceived,
    /// Accepted heartbeats forwarded to neighbors.
    HeartbeatsRelayed,
    /// Dropped: proof-of-work check failed.
    InvalidPow,
    /// Dropped: sequence number not newer than the stored one.
    DuplicateSeq,
    /// Dropped: signature (or key reconstruction) failed.
    InvalidSig,
    /// Peers admitted for the first time.
    NewPeersAdded,
    /// Leave messages processed.
    LeaveMessages,
    /// Lines dropped by the codec: oversize or unparseable.
    Malformed,
    /// Raw bytes read off sockets.
    BytesReceived,
    /// Bytes written while relaying.
    BytesRelayed,
}

/// Live counters for the current window.
#[derive(Default)]
pub struct Diagnostics {
    heartbeats_received: AtomicU64,
    heartbeats_relayed: AtomicU64,
    invalid_pow: AtomicU64,
    duplicate_seq: AtomicU64,
    invalid_sig: AtomicU64,
    new_peers_added: AtomicU64,
    leave_messages: AtomicU64,
    malformed: AtomicU64,
    bytes_received: AtomicU64,
    bytes_relayed: AtomicU64,
    last: Mutex<DiagnosticsSnapshot>,
}

/// One completed window of counters, as published to the dashboard.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub heartbeats_received: u64,
    pub heartbeats_relayed: u64,
    #[serde(rename = "invalidPoW")]
    pub invalid_pow: u64,
    pub duplicate_seq: u64,
    pub invalid_sig: u64,
    pub new_peers_added: u64,
    pub leave_messages: u64,
    pub malformed: u64,
    pub bytes_received: u64,
    pub bytes_relayed: u64,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump a counter by one.
    pub fn count(&self, counter: Counter) {
        self.add(counter, 1);
    }

    /// Bump a counter by `n` (byte counters).
    pub fn add(&self, counter: Counter, n: u64) {
        self.cell(counter).fetch_add(n, Ordering::Relaxed);
    }

    fn cell(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::HeartbeatsReceived => &self.heartbeats_received,
            Counter::HeartbeatsRelayed => &self.heartbeats_relayed,
            Counter::InvalidPow => &self.invalid_pow,
            Counter::DuplicateSeq => &self.duplicate_seq,
            Counter::InvalidSig => &self.invalid_sig,
            Counter::NewPeersAdded => &self.new_peers_added,
            Counter::LeaveMessages => &self.leave_messages,
            Counter::Malformed => &self.malformed,
            Counter::BytesReceived => &self.bytes_received,
            Counter::BytesRelayed => &self.bytes_relayed,
        }
    }

    /// Close the current window: publish its counts and start the next
    /// window at zero.
    pub fn roll(&self) {
        let snapshot = DiagnosticsSnapshot {
            heartbeats_received: self.heartbeats_received.swap(0, Ordering::Relaxed),
            heartbeats_relayed: self.heartbeats_relayed.swap(0, Ordering::Relaxed),
            invalid_pow: self.invalid_pow.swap(0, Ordering::Relaxed),
            duplicate_seq: self.duplicate_seq.swap(0, Ordering::Relaxed),
            invalid_sig: self.invalid_sig.swap(0, Ordering::Relaxed),
            new_peers_added: self.new_peers_added.swap(0, Ordering::Relaxed),
            leave_messages: self.leave_messages.swap(0, Ordering::Relaxed),
            malformed: self.malformed.swap(0, Ordering::Relaxed),
            bytes_received: self.bytes_received.swap(0, Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.swap(0, Ordering::Relaxed),
        };
        *self.last.lock().expect("diagnostics lock poisoned") = snapshot;
    }

    /// The last completed window.
    pub fn last(&self) -> DiagnosticsSnapshot {
        self.last.lock().expect("diagnostics lock poisoned").clone()
    }

    /// Live value of a counter in the current window. Test hook.
    pub fn current(&self, counter: Counter) -> u64 {
        self.cell(counter).load(Ordering::Relaxed)
    }
}
