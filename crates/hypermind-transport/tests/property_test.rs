//! Property-based tests for the transport crate.
//!
//! Tests invariants that must hold for all inputs, chiefly that the sweep
//! permutation really is a permutation.

use std::net::Ipv4Addr;

use proptest::prelude::*;

use hypermind_transport::{FeistelPermutation, ScanSequence};

proptest! {
    /// Property: distinct inputs never collide (spot-checked pairwise over
    /// the full 32-bit domain; the reduced-width exhaustive proof lives in
    /// the unit tests).
    #[test]
    fn prop_permutation_is_injective_pairwise(a in any::<u32>(), b in any::<u32>()) {
        prop_assume!(a != b);
        let perm = FeistelPermutation::from_seed(b"pairwise");
        prop_assert_ne!(perm.permute(a), perm.permute(b));
    }
}

proptest! {
    /// Property: the permutation is a pure function of (seed, input).
    #[test]
    fn prop_permutation_is_deterministic(seed in any::<[u8; 32]>(), v in any::<u32>()) {
        let first = FeistelPermutation::from_seed(&seed).permute(v);
        let second = FeistelPermutation::from_seed(&seed).permute(v);
        prop_assert_eq!(first, second);
    }
}

proptest! {
    /// Property: reduced-width outputs stay inside their domain.
    #[test]
    fn prop_reduced_width_stays_in_domain(seed in any::<[u8; 16]>(), v in 0u32..1 << 16) {
        let perm = FeistelPermutation::from_seed(&seed);
        let out = perm.permute_half_width(v, 8);
        prop_assert!(out < 1 << 16);
    }
}

proptest! {
    /// Property: every address the scan sequence yields is publicly
    /// routable unicast space.
    #[test]
    fn prop_scan_sequence_respects_the_filter(seed in any::<[u8; 32]>()) {
        let addrs: Vec<Ipv4Addr> =
            ScanSequence::new(FeistelPermutation::from_seed(&seed)).take(128).collect();
        for addr in addrs {
            prop_assert!(hypermind_transport::bootstrap::is_scannable(addr));
        }
    }
}
