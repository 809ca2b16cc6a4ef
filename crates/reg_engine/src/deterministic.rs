//! Deterministic utilities for reproducible model search
//!
//! LCG-based row sampling, hash-ordered holdout selection and split
//! tie-breaking, so identical inputs always produce identical models.

use std::cmp::Ordering;
use std::num::Wrapping;

/// Linear Congruential Generator for deterministic pseudo-randomness
/// Uses constants from Numerical Recipes (glibc)
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<i64>,
}

impl LcgRng {
    const MULTIPLIER: i64 = 1103515245;
    const INCREMENT: i64 = 12345;
    const MODULUS: i64 = 1 << 31;

    pub fn new(seed: i64) -> Self {
        Self {
            state: Wrapping(seed.wrapping_abs() % Self::MODULUS),
        }
    }

    /// Next value in [0, MODULUS)
    pub fn next_i64(&mut self) -> i64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        self.state.0 & (Self::MODULUS - 1)
    }

    /// Next value in [0.0, 1.0)
    pub fn next_unit(&mut self) -> f64 {
        self.next_i64() as f64 / Self::MODULUS as f64
    }
}

/// Deterministic xxhash64-like mixing of a word sequence
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

/// Row indices split into (fit, holdout).
///
/// Rows are ordered by the hash of their index and the first
/// `ceil(n * fraction)` become the holdout; both sides keep ascending index
/// order. At least one row is kept on each side when `n >= 2`.
pub fn holdout_indices(n: usize, fraction: f64, seed: i64) -> (Vec<usize>, Vec<usize>) {
    if n < 2 {
        return ((0..n).collect(), Vec::new());
    }

    let holdout_len = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);

    let mut order: Vec<(i64, usize)> = (0..n)
        .map(|i| (xxhash64_i64(&[i as i64], seed), i))
        .collect();
    order.sort_unstable();

    let mut holdout: Vec<usize> = order[..holdout_len].iter().map(|(_, i)| *i).collect();
    let mut fit: Vec<usize> = order[holdout_len..].iter().map(|(_, i)| *i).collect();
    holdout.sort_unstable();
    fit.sort_unstable();

    (fit, holdout)
}

/// Deterministic tie-breaker for split selection
/// Orders candidates by (feature_idx, threshold, node_id)
#[derive(Debug, Clone, Copy)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: f64,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: f64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            node_id,
        }
    }
}

impl PartialEq for SplitTieBreaker {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SplitTieBreaker {}

impl PartialOrd for SplitTieBreaker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SplitTieBreaker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.feature_idx
            .cmp(&other.feature_idx)
            .then(self.threshold.total_cmp(&other.threshold))
            .then(self.node_id.cmp(&other.node_id))
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
    fn test_lcg_unit_range() {
        let mut rng = LcgRng::new(i64::MIN);
        for _ in 0..1000 {
            let val = rng.next_unit();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_xxhash64_different_seeds() {
        let data = vec![1, 2, 3, 4, 5];
        assert_eq!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 42));
        assert_ne!(xxhash64_i64(&data, 42), xxhash64_i64(&data, 43));
    }

    #[test]
    fn test_holdout_is_partition() {
        let (fit, holdout) = holdout_indices(50, 0.2, 7);
        assert_eq!(holdout.len(), 10);
        assert_eq!(fit.len(), 40);

        let mut all: Vec<usize> = fit.iter().chain(holdout.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(holdout_indices(50, 0.2, 7), (fit, holdout));
    }

    #[test]
    fn test_holdout_small_inputs() {
        assert_eq!(holdout_indices(1, 0.2, 0), (vec![0], vec![]));
        let (fit, holdout) = holdout_indices(2, 0.2, 0);
        assert_eq!((fit.len(), holdout.len()), (1, 1));
    }

    #[test]
    fn test_tie_breaker_ordering() {
        let t1 = SplitTieBreaker::new(0, 100.0, 0);
        let t2 = SplitTieBreaker::new(0, 100.0, 1);
        let t3 = SplitTieBreaker::new(1, 50.0, 0);

        assert!(t1 < t2);
        assert!(t1 < t3);
    }
}
