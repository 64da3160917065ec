//! Deterministic utilities for reproducible training
//!
//! LCG-based randomness, hash-based row ordering and split tie-breaking, so
//! the same data and seed always produce the same ensemble.

use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    // LCG constants (compatible with glibc)
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.wrapping_abs() % Self::MODULUS),
        }
    }

    /// Next value in `[0, MODULUS)`
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in `[0, max)`; `0` for a non-positive bound
    pub fn next_range(&mut self, max: i64) -> i64 {
        if max <= 0 {
            return 0;
        }
        // Wide bounds (fixed-point feature ranges) need more than 31 bits
        let wide = (self.next_i64() << 31) | self.next_i64();
        wide % max
    }

    /// Next index in `[0, len)`
    pub fn next_index(&mut self, len: usize) -> usize {
        self.next_range(len as i64) as usize
    }
}

/// Deterministic xxhash64-like hash in pure i64 arithmetic
pub fn xxhash64_i64(data: &[i64], seed: i64) -> i64 {
    const PRIME1: i64 = 0x9E3779B185EBCA87_u64 as i64;
    const PRIME2: i64 = 0xC2B2AE3D27D4EB4F_u64 as i64;
    const PRIME3: i64 = 0x165667B19E3779F9_u64 as i64;
    const PRIME5: i64 = 0x85EBCA77C2B2AE63_u64 as i64;

    let mut h = seed.wrapping_add(PRIME5);

    for &val in data {
        h = h.wrapping_add(val.wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME2);
    }

    h ^= h >> 33;
    h = h.wrapping_mul(PRIME1);
    h ^= h >> 29;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 32;

    h
}

/// Row order for a seeded shuffle: indices sorted by their hash
pub fn shuffled_indices(len: usize, seed: i64) -> Vec<usize> {
    let mut keyed: Vec<(i64, usize)> = (0..len)
        .map(|i| (xxhash64_i64(&[i as i64], seed), i))
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, i)| i).collect()
}

/// Independent seed for the `index`-th tree of a bagged ensemble
pub fn derive_seed(seed: i64, index: usize) -> i64 {
    xxhash64_i64(&[index as i64], seed)
}

/// Deterministic tie-breaker for split selection
/// Orders candidates by (feature_idx, threshold)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64) -> Self {
        Self {
            feature_idx,
            threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_determinism() {
        let mut rng1 = LcgRng::new(42);
        let mut rng2 = LcgRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_i64(), rng2.next_i64());
        }
    }

    #[test]
    fn test_lcg_range() {
        let mut rng = LcgRng::new(42);
        for _ in 0..100 {
            let val = rng.next_range(10);
            assert!((0..10).contains(&val));
        }
        for _ in 0..100 {
            let val = rng.next_range(5_000_000_000_000);
            assert!((0..5_000_000_000_000).contains(&val));
        }
        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_xxhash64_different_seeds() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 42));
        assert_ne!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 43));
    }

    #[test]
    fn test_shuffle_is_a_seeded_permutation() {
        let a = shuffled_indices(50, 42);
        let b = shuffled_indices(50, 42);
        let c = shuffled_indices(50, 7);

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 100);
        let t2 = SplitTieBreaker::new(0, 200);
        let t3 = SplitTieBreaker::new(1, 50);

        assert!(t1 < t2);
        assert!(t2 < t3);
    }
}
