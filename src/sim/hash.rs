//! Cell hashing and periodic wave helpers
//!
//! These mirror the WGSL in `renderer/galaxy.wgsl` operation for operation;
//! keep the two in sync.

use glam::Vec2;

use crate::{fract, smoothstep};

/// Pseudo-random value in [0, 1) for a cell coordinate.
///
/// Multiply-fract, dot, multiply-fract chain. Pure: the same coordinate always
/// yields the same value. Repeats on a 50 x 100 cell lattice.
#[inline]
pub fn hash21(p: Vec2) -> f32 {
    let mut q = Vec2::new(fract(p.x * 123.34), fract(p.y * 456.21));
    let d = q.dot(q + 45.32);
    q += d;
    fract(q.x * q.y)
}

/// Triangle wave in [0, 1] with period 1
#[inline]
pub fn tri(x: f32) -> f32 {
    (fract(x) * 2.0 - 1.0).abs()
}

/// Smoothed triangle wave in [0, 1], peaking at half period
#[inline]
pub fn tris(x: f32) -> f32 {
    let t = fract(x);
    1.0 - smoothstep(0.0, 1.0, (2.0 * t - 1.0).abs())
}

/// Signed smoothed triangle wave in [-1, 1]
#[inline]
pub fn trisn(x: f32) -> f32 {
    2.0 * tris(x) - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_deterministic() {
        for y in -20..20 {
            for x in -20..20 {
                let p = Vec2::new(x as f32, y as f32);
                assert_eq!(hash21(p).to_bits(), hash21(p).to_bits());
            }
        }
    }

    #[test]
    fn test_hash_roughly_uniform() {
        // 128 x 128 = 16384 cells into 10 buckets
        let mut buckets = [0usize; 10];
        let mut total = 0usize;
        for y in 0..128 {
            for x in 0..128 {
                let h = hash21(Vec2::new(x as f32 - 64.0, y as f32 - 64.0));
                assert!((0.0..1.0).contains(&h));
                buckets[((h * 10.0) as usize).min(9)] += 1;
                total += 1;
            }
        }
        let expected = total as f32 / 10.0;
        for (i, &count) in buckets.iter().enumerate() {
            let ratio = count as f32 / expected;
            assert!(
                (0.8..1.2).contains(&ratio),
                "bucket {i} has {count}, expected ~{expected}"
            );
        }
    }

    #[test]
    fn test_hash_adjacent_cells_differ() {
        // Neighbouring cells landing within 1% of each other should be about
        // as rare as chance (~2%), not systematic.
        let mut close = 0usize;
        let mut pairs = 0usize;
        for y in 0..100 {
            for x in 0..100 {
                let a = hash21(Vec2::new(x as f32, y as f32));
                let right = hash21(Vec2::new(x as f32 + 1.0, y as f32));
                let up = hash21(Vec2::new(x as f32, y as f32 + 1.0));
                for b in [right, up] {
                    pairs += 1;
                    if (a - b).abs() < 0.01 {
                        close += 1;
                    }
                }
            }
        }
        assert!((close as f32 / pairs as f32) < 0.05, "{close} of {pairs} neighbours nearly equal");
    }

    #[test]
    fn test_hash_no_short_row_period() {
        // The multipliers give an exact lattice period of (50, 100) cells,
        // i.e. 5000 unique cells; nothing shorter may show up along a row.
        let row: Vec<f32> = (0..400).map(|x| hash21(Vec2::new(x as f32, 7.0))).collect();
        for period in 1..=40 {
            let matches = (0..row.len() - period)
                .filter(|&i| (row[i] - row[i + period]).abs() < 1e-3)
                .count();
            assert!(matches < row.len() / 20, "period {period} repeats {matches} times");
        }
    }

    #[test]
    fn test_wave_shapes() {
        assert!((tri(0.0) - 1.0).abs() < 1e-6);
        assert!(tri(0.5).abs() < 1e-6);
        assert!(tris(0.0).abs() < 1e-6);
        assert!((tris(0.5) - 1.0).abs() < 1e-6);
        assert!((trisn(0.0) + 1.0).abs() < 1e-6);
        assert!((trisn(0.5) - 1.0).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn prop_hash_in_unit_range(x in -10_000i32..10_000, y in -10_000i32..10_000) {
            let h = hash21(Vec2::new(x as f32, y as f32));
            prop_assert!((0.0..1.0).contains(&h));
        }

        #[test]
        fn prop_waves_bounded(x in -1.0e4f32..1.0e4) {
            prop_assert!((0.0..=1.0).contains(&tri(x)));
            prop_assert!((0.0..=1.0).contains(&tris(x)));
            prop_assert!((-1.0..=1.0).contains(&trisn(x)));
        }
    }
}
