//! xorshift64* generator for scan-order permutations
//!
//! The propagator's results must not depend on the order in which processes
//! are scanned. Shuffled scan orders exercise that; they must themselves be
//! reproducible, so the same seed always yields the same permutation.

use serde::{Deserialize, Serialize};

/// Deterministic xorshift64* generator
///
/// # Example
/// ```
/// use mfa_core_rs::rng::ScanRng;
///
/// let mut a = ScanRng::new(7);
/// let mut b = ScanRng::new(7);
/// let mut left = vec![0, 1, 2, 3, 4];
/// let mut right = left.clone();
/// a.shuffle(&mut left);
/// b.shuffle(&mut right);
/// assert_eq!(left, right);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRng {
    state: u64,
}

impl ScanRng {
    /// Create a generator; a zero seed is replaced by 1 (xorshift requirement)
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generator for one period, derived from a base seed
    pub fn for_period(seed: u64, period: usize) -> Self {
        Self::new(seed ^ (period as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Next raw value
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform index in `[0, bound)`
    ///
    /// # Panics
    /// Panics if `bound` is zero
    pub fn below(&mut self, bound: usize) -> usize {
        assert!(bound > 0, "bound must be positive");
        (self.next_u64() % bound as u64) as usize
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.below(i + 1);
            items.swap(i, j);
        }
    }
}
