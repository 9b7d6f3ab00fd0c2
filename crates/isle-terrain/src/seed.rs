//! Seeded stream RNG derivation and determinism helpers.
//!
//! Every generation step owns its own [`ChaCha8Rng`], seeded from the world
//! seed XOR a per-step constant. No step reads or advances another step's
//! stream, so reordering or disabling one step never shifts the output of the
//! others.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// Per-step salts
// ---------------------------------------------------------------------------

pub const HEIGHT_SALT: u64 = 0x4E16_A7F1;
pub const FEATURE_SALT: u64 = 0x051F_3A1B;
pub const CAVE_SALT: u64 = 0x000C_0A7E;
pub const SURFACE_SALT: u64 = 0x05EE_D123;
pub const PROPS_SALT: u64 = 0x071A_9C3D;
pub const TREES_SALT: u64 = 0x07EE_5A11;
pub const MOBS_SALT: u64 = 1337;
pub const GROUPS_SALT: u64 = 7777;

/// Build the stream RNG for one step: `seed ^ salt`.
pub fn step_rng(seed: u64, salt: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed ^ salt)
}

/// Salt for the `index`-th prop rule, so rules never share a stream.
#[inline]
pub fn prop_rule_salt(index: usize) -> u64 {
    PROPS_SALT ^ (index as u64).wrapping_mul(9973)
}

/// Uniform draw in `[lo, hi)`, returning `lo` for empty or inverted ranges.
///
/// `Rng::random_range` panics on an empty range; rule configs routinely set
/// `min == max` to disable variation, so every range draw goes through here.
#[inline]
pub fn uniform(rng: &mut impl Rng, lo: f32, hi: f32) -> f32 {
    if hi > lo { rng.random_range(lo..hi) } else { lo }
}

/// Inclusive integer draw in `[lo, hi]`; `hi < lo` collapses to `lo`.
#[inline]
pub fn uniform_count(rng: &mut impl Rng, lo: u32, hi: u32) -> u32 {
    if hi > lo { rng.random_range(lo..=hi) } else { lo }
}

/// Noise-domain offset in `[-10000, 10000)`.
#[inline]
pub fn noise_offset(rng: &mut impl Rng) -> f32 {
    rng.random_range(-10_000.0f32..10_000.0)
}

/// Wall-clock seed used when a session asks for a fresh world each start.
pub fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

const FNV_OFFSET: u64 = 0xCBF2_9CE4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Bit-exact digest of a float buffer, for determinism comparisons.
///
/// FNV-1a over the little-endian length and bit patterns, so a digest stays
/// the same across toolchains and platforms.
pub fn checksum_f32(values: &[f32]) -> u64 {
    let len = (values.len() as u64).to_le_bytes();
    let bits = values.iter().flat_map(|v| v.to_bits().to_le_bytes());
    len.into_iter().chain(bits).fold(FNV_OFFSET, |h, byte| {
        (h ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_step_rng_deterministic() {
        let mut a = step_rng(12345, FEATURE_SALT);
        let mut b = step_rng(12345, FEATURE_SALT);
        for _ in 0..1000 {
            assert_eq!(
                a.next_u64(),
                b.next_u64(),
                "same seed and salt must give the same stream"
            );
        }
    }

    #[test]
    fn test_step_salts_separate_streams() {
        let salts = [
            HEIGHT_SALT,
            FEATURE_SALT,
            CAVE_SALT,
            SURFACE_SALT,
            PROPS_SALT,
            TREES_SALT,
            MOBS_SALT,
            GROUPS_SALT,
        ];
        let firsts: Vec<u64> = salts.iter().map(|&s| step_rng(42, s).next_u64()).collect();
        for i in 0..firsts.len() {
            for j in (i + 1)..firsts.len() {
                assert_ne!(firsts[i], firsts[j], "salts {i} and {j} collide");
            }
        }
    }

    #[test]
    fn test_prop_rule_salts_differ() {
        assert_eq!(prop_rule_salt(0), PROPS_SALT);
        assert_ne!(prop_rule_salt(1), prop_rule_salt(2));
    }

    #[test]
    fn test_uniform_empty_range_returns_lo() {
        let mut rng = step_rng(1, 2);
        assert_eq!(uniform(&mut rng, 3.0, 3.0), 3.0);
        assert_eq!(uniform(&mut rng, 5.0, 1.0), 5.0);
        assert_eq!(uniform_count(&mut rng, 4, 2), 4);
        for _ in 0..100 {
            let v = uniform(&mut rng, 0.9, 1.4);
            assert!((0.9..1.4).contains(&v), "draw {v} escaped range");
            let c = uniform_count(&mut rng, 3, 8);
            assert!((3..=8).contains(&c), "count {c} escaped range");
        }
    }

    #[test]
    fn test_checksum_detects_single_bit_change() {
        let a = vec![0.25f32; 64];
        let mut b = a.clone();
        assert_eq!(checksum_f32(&a), checksum_f32(&b));
        b[17] = f32::from_bits(b[17].to_bits() ^ 1);
        assert_ne!(checksum_f32(&a), checksum_f32(&b));
    }

    #[test]
    fn test_checksum_is_pinned() {
        assert_eq!(checksum_f32(&[]), 0xA8C7_F832_281A_39C5);
        assert_eq!(checksum_f32(&[0.0, 1.0, -2.5]), 0x07C6_AB21_3757_2AF7);
        assert_ne!(checksum_f32(&[0.0]), checksum_f32(&[-0.0]), "sign bit counts");
    }
}
