//! Keyed Feistel permutation over the IPv4 address space.
//!
//! The sweep wants to visit all 2^32 addresses in a pseudorandom order
//! with nothing but a counter for state, and it wants different nodes to
//! sweep in different orders so probe load spreads. A four-round Feistel
//! network over the two 16-bit halves of the address gives exactly that:
//! the construction is a bijection whatever the round function does, so a
//! full counter cycle visits every address exactly once, and the order is
//! keyed by a per-node seed.

use hkdf::Hkdf;
use sha2::Sha256;

/// HKDF info string the round keys are derived under.
const KEY_INFO: &[u8] = b"feistel-ipv4-scan";

const ROUNDS: usize = 4;

/// A seeded four-round Feistel permutation of 32-bit values.
#[derive(Debug, Clone)]
pub struct FeistelPermutation {
    /// Two 32-bit words per round, taken from an 8-byte round key.
    keys: [[u32; 2]; ROUNDS],
}

impl FeistelPermutation {
    /// Derive round keys from a seed via HKDF-SHA-256: 32 output bytes,
    /// split into four 8-byte round keys.
    pub fn from_seed(seed: &[u8]) -> Self {
        let hk = Hkdf::<Sha256>::new(None, seed);
        let mut okm = [0u8; 8 * ROUNDS];
        hk.expand(KEY_INFO, &mut okm)
            .expect("32 bytes is a valid HKDF-SHA256 output length");

        let mut keys = [[0u32; 2]; ROUNDS];
        for (round, chunk) in okm.chunks_exact(8).enumerate() {
            keys[round] = [
                u32::from_be_bytes(chunk[0..4].try_into().expect("4-byte slice")),
                u32::from_be_bytes(chunk[4..8].try_into().expect("4-byte slice")),
            ];
        }
        Self { keys }
    }

    /// Permute a 32-bit value (16-bit halves).
    pub fn permute(&self, value: u32) -> u32 {
        self.permute_half_width(value, 16)
    }

    /// Permute a `2 * half_bits`-wide value.
    ///
    /// The reduced widths exist so the bijection can be tested
    /// exhaustively; production use is `half_bits = 16`.
    pub fn permute_half_width(&self, value: u32, half_bits: u32) -> u32 {
        debug_assert!(half_bits >= 1 && half_bits <= 16);
        let mask: u32 = (1 << half_bits) - 1;

        let mut left = (value >> half_bits) & mask;
        let mut right = value & mask;

        for key in &self.keys {
            // Expand the right half to 32 bits by duplication, mix, then
            // swap: classic Feistel, so inversion needs no invertible mix.
            let expanded = (right << half_bits) | right;
            let mixed = round_function(expanded, key);
            let new_right = left ^ (mixed & mask);
            left = right;
            right = new_right;
        }

        (left << half_bits) | right
    }
}

/// The mixing function: xor-rotate-xor-rotate under the round key words.
fn round_function(x: u32, key: &[u32; 2]) -> u32 {
    ((x ^ key[0]).rotate_left(7) ^ key[1]).rotate_left(13)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_permutation() {
        let a = FeistelPermutation::from_seed(b"seed");
        let b = FeistelPermutation::from_seed(b"seed");
        for v in [0u32, 1, 0xdead_beef, u32::MAX] {
            assert_eq!(a.permute(v), b.permute(v));
        }
    }

    #[test]
    fn different_seeds_differ_somewhere() {
        let a = FeistelPermutation::from_seed(b"seed-a");
        let b = FeistelPermutation::from_seed(b"seed-b");
        assert!((0..1024u32).any(|v| a.permute(v) != b.permute(v)));
    }

    #[test]
    fn bijection_exhaustive_at_8_bit_halves() {
        let perm = FeistelPermutation::from_seed(b"bijection-test");
        let mut seen = vec![false; 1 << 16];
        for v in 0..(1u32 << 16) {
            let out = perm.permute_half_width(v, 8) as usize;
            assert!(out < seen.len(), "output out of domain: {out}");
            assert!(!seen[out], "collision at input {v}");
            seen[out] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn bijection_exhaustive_at_4_bit_halves() {
        for seed in [&b"a"[..], b"b", b"c"] {
            let perm = FeistelPermutation::from_seed(seed);
            let mut seen = [false; 256];
            for v in 0..256u32 {
                let out = perm.permute_half_width(v, 4) as usize;
                assert!(!seen[out]);
                seen[out] = true;
            }
        }
    }

    #[test]
    fn full_width_outputs_stay_in_domain_and_spread() {
        let perm = FeistelPermutation::from_seed(b"spread");
        // Consecutive counters should not map to consecutive addresses.
        let outs: Vec<u32> = (0..16).map(|v| perm.permute(v)).collect();
        let consecutive = outs.windows(2).filter(|w| w[1] == w[0].wrapping_add(1)).count();
        assert!(consecutive < 2, "permutation looks like identity: {outs:?}");
    }

    #[test]
    fn no_fixed_identity_mapping() {
        let perm = FeistelPermutation::from_seed(b"identity-check");
        // With four keyed rounds the identity map would be astonishing.
        assert!((0..256u32).any(|v| perm.permute(v) != v));
    }
}
