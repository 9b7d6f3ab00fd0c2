//! Stateless integer hashing used wherever results must not depend on call order.
//!
//! Every function here is pure: the same inputs always produce the same output,
//! on every platform, regardless of what else has been hashed before.

/// Mix two 32-bit words into one well-distributed word.
#[inline]
pub fn hash2(a: u32, b: u32) -> u32 {
    let mut x = a
        .wrapping_mul(0x9E37_79B9)
        .wrapping_add(b.wrapping_mul(0x85EB_CA6B));
    x ^= x >> 16;
    x = x.wrapping_mul(0x7FEB_352D);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846C_A68B);
    x ^= x >> 16;
    x
}

/// Mix three words, left to right.
#[inline]
pub fn hash3(a: u32, b: u32, c: u32) -> u32 {
    hash2(hash2(a, b), c)
}

/// Map `(hash, salt)` to a float in `[0, 1)`.
///
/// Uses the low 24 bits so every result is exactly representable as `f32`.
#[inline]
pub fn hash01(h: u32, salt: u32) -> f32 {
    let x = hash2(h, salt);
    (x & 0x00FF_FFFF) as f32 / 16_777_216.0
}

/// Secondary hash family for per-cell gates.
///
/// Deliberately unrelated to [`hash2`] so a gate keyed on a cell index never
/// correlates with placement draws keyed on the same index.
#[inline]
pub fn cell_hash01(a: u32, b: u32) -> f32 {
    let mut x = a
        .wrapping_mul(374_761_393)
        .wrapping_add(b.wrapping_mul(668_265_263));
    x = (x ^ (x >> 13)).wrapping_mul(1_274_126_177);
    x ^= x >> 16;
    (x & 0x00FF_FFFF) as f32 / 16_777_216.0
}

/// Fold a 64-bit seed into the 32-bit domain of the hash functions.
#[inline]
pub fn fold_seed(seed: u64) -> u32 {
    (seed as u32) ^ ((seed >> 32) as u32)
}

/// Base hash for one placement rule inside one streaming chunk.
///
/// Per-trial values are then drawn with [`hash01`] using the trial index and a
/// per-purpose salt, so the whole chunk is a pure function of
/// `(seed, chunk_x, chunk_y, rule_index)`.
#[inline]
pub fn chunk_rule_hash(seed: u32, chunk_x: i32, chunk_y: i32, rule_index: u32) -> u32 {
    let base = hash3(
        seed,
        chunk_x.wrapping_mul(73_856_093) as u32,
        chunk_y.wrapping_mul(19_349_663) as u32,
    );
    hash3(base, rule_index, 0xA341_316C)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash2_deterministic() {
        for i in 0..1000u32 {
            assert_eq!(hash2(i, i * 7), hash2(i, i * 7));
        }
    }

    #[test]
    fn test_hash2_order_sensitive() {
        assert_ne!(hash2(1, 2), hash2(2, 1), "argument order must matter");
    }

    #[test]
    fn test_hash01_in_unit_interval() {
        for i in 0..10_000u32 {
            let v = hash01(0xDEAD_BEEF, i);
            assert!((0.0..1.0).contains(&v), "hash01 out of range: {v}");
        }
    }

    #[test]
    fn test_cell_hash01_in_unit_interval() {
        for i in 0..10_000u32 {
            let v = cell_hash01(i, 99);
            assert!((0.0..1.0).contains(&v), "cell_hash01 out of range: {v}");
        }
    }

    #[test]
    fn test_hash01_roughly_uniform() {
        let n = 20_000u32;
        let mean: f32 = (0..n).map(|i| hash01(42, i)).sum::<f32>() / n as f32;
        assert!(
            (mean - 0.5).abs() < 0.02,
            "mean of uniform draws should be near 0.5, got {mean}"
        );

        let mut buckets = [0u32; 10];
        for i in 0..n {
            let b = (hash01(7, i) * 10.0) as usize;
            buckets[b.min(9)] += 1;
        }
        for (i, &count) in buckets.iter().enumerate() {
            assert!(
                count > n / 10 - n / 50 && count < n / 10 + n / 50,
                "bucket {i} has {count} samples, expected about {}",
                n / 10
            );
        }
    }

    #[test]
    fn test_chunk_rule_hash_distinguishes_inputs() {
        let base = chunk_rule_hash(12345, 3, -4, 0);
        assert_eq!(base, chunk_rule_hash(12345, 3, -4, 0));
        assert_ne!(base, chunk_rule_hash(12345, -4, 3, 0));
        assert_ne!(base, chunk_rule_hash(12345, 3, -4, 1));
        assert_ne!(base, chunk_rule_hash(54321, 3, -4, 0));
    }

    #[test]
    fn test_fold_seed_uses_both_halves() {
        assert_ne!(fold_seed(1), fold_seed(1 << 32 | 1));
        assert_eq!(fold_seed(0), 0);
    }
}
