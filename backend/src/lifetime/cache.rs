//! Shared memo of survival curves
//!
//! Curves are keyed by family and exact parameter bits. Scenarios running on
//! different worker threads share one cache; a curve is computed once and
//! handed out as an `Arc` that is never mutated afterwards.

use super::{DistributionKey, LifetimeDistribution};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Concurrent-safe cache of survival curves
#[derive(Debug, Default)]
pub struct SurvivalCache {
    curves: RwLock<HashMap<DistributionKey, Arc<[f64]>>>,
}

impl SurvivalCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Survival values for ages `0..len`
    ///
    /// Returns a cached curve when one of at least `len` ages exists,
    /// otherwise computes it and stores the longer curve.
    ///
    /// # Example
    /// ```
    /// use mfa_core_rs::lifetime::{LifetimeDistribution, SurvivalCache};
    ///
    /// let cache = SurvivalCache::new();
    /// let dist = LifetimeDistribution::Fixed { lifetime: 2.0 };
    /// let curve = cache.curve(&dist, 4);
    /// assert_eq!(&curve[..4], &[1.0, 1.0, 0.0, 0.0]);
    /// assert_eq!(cache.len(), 1);
    /// ```
    pub fn curve(&self, distribution: &LifetimeDistribution, len: usize) -> Arc<[f64]> {
        let key = distribution.key();
        if let Some(curve) = self.curves.read().get(&key) {
            if curve.len() >= len {
                return Arc::clone(curve);
            }
        }

        let mut curves = self.curves.write();
        // Another thread may have filled it while we waited for the lock
        if let Some(curve) = curves.get(&key) {
            if curve.len() >= len {
                return Arc::clone(curve);
            }
        }
        let curve: Arc<[f64]> = distribution.survival_curve(len).into();
        curves.insert(key, Arc::clone(&curve));
        curve
    }

    /// Number of distinct distributions cached
    pub fn len(&self) -> usize {
        self.curves.read().len()
    }

    /// Check if nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.curves.read().is_empty()
    }
}
