//! Pseudorandom enumeration of scannable IPv4 addresses.

use std::net::Ipv4Addr;

use super::feistel::FeistelPermutation;

/// Whether an address is worth probing: publicly routable unicast space.
///
/// Skips loopback, RFC 1918 private ranges, link-local, multicast, and the
/// reserved 240/4 block.
pub fn is_scannable(addr: Ipv4Addr) -> bool {
    !(addr.is_loopback()
        || addr.is_private()
        || addr.is_link_local()
        || addr.is_multicast()
        || addr.octets()[0] >= 240)
}

/// Iterator over the full IPv4 space in seeded pseudorandom order,
/// yielding only scannable addresses.
///
/// State is a single 32-bit counter; the permutation guarantees each
/// address appears exactly once per cycle.
pub struct ScanSequence {
    perm: FeistelPermutation,
    counter: u64,
}

impl ScanSequence {
    pub fn new(perm: FeistelPermutation) -> Self {
        Self { perm, counter: 0 }
    }
}

impl Iterator for ScanSequence {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        while self.counter <= u64::from(u32::MAX) {
            let addr = Ipv4Addr::from(self.perm.permute(self.counter as u32));
            self.counter += 1;
            if is_scannable(addr) {
                return Some(addr);
            }
        }
        None
    }
}
