//! Stock model
//!
//! A stock belongs to exactly one stock-bearing process. It holds:
//! - The lifetime distribution governing how long material stays
//! - Live cohorts `(entry period, initial mass, remaining mass)`
//! - Per-period history of inflow, outflow and level
//!
//! # Critical Invariants
//!
//! 1. **Cohort sum**: Sum of live cohort remaining mass equals `level`
//! 2. **Conservation**: `level[t] = level[t-1] + inflow[t] - outflow[t]`
//! 3. **Ordering**: Periods are advanced strictly in increasing order
//!
//! The stock only stores state. Advancing it is the job of
//! [`crate::dynamics::StockEngine`], which computes a step in full before
//! committing it here.

use crate::lifetime::LifetimeDistribution;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Mass that entered the stock in one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    /// Period the mass entered
    pub entry: usize,
    /// Mass at entry
    pub initial: f64,
    /// Mass still in stock
    pub remaining: f64,
}

/// Dense, ordered store of live cohorts
///
/// Cohorts sit contiguously in entry order. Compaction keeps survivors in
/// place and truncates, so the backing allocation is reused across periods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortArena {
    cohorts: Vec<Cohort>,
}

impl CohortArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live cohorts
    pub fn live(&self) -> usize {
        self.cohorts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cohort> {
        self.cohorts.iter()
    }

    pub fn as_slice(&self) -> &[Cohort] {
        &self.cohorts
    }

    /// Sum of remaining mass
    pub fn total(&self) -> f64 {
        self.cohorts.iter().map(|c| c.remaining).sum()
    }

    pub(crate) fn replace(&mut self, cohorts: &[Cohort]) {
        self.cohorts.clear();
        self.cohorts.extend_from_slice(cohorts);
    }
}

/// One committed stock step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockStep {
    pub period: usize,
    pub inflow: f64,
    pub outflow: f64,
    pub level: f64,
    /// Mass retired early because its cohort fell below the negligible threshold
    pub retired: f64,
}

/// Per-period record of a stock
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockHistory {
    pub inflow: Vec<f64>,
    pub outflow: Vec<f64>,
    pub level: Vec<f64>,
    /// Live cohorts at the end of each period (empty when not recorded)
    pub cohorts: Vec<Vec<Cohort>>,
}

impl StockHistory {
    /// `level[t] - level[t-1]`, with `level[-1] = 0`
    pub fn net_change(&self) -> Vec<f64> {
        let mut previous = 0.0;
        self.level
            .iter()
            .map(|&level| {
                let delta = level - previous;
                previous = level;
                delta
            })
            .collect()
    }
}

/// Cohort-based stock owned by one process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stock {
    /// Owning process ID
    process_id: String,

    /// Lifetime distribution of stocked material
    distribution: LifetimeDistribution,

    /// Survival values by age, resolved from the shared cache
    #[serde(skip)]
    curve: Option<Arc<[f64]>>,

    /// Live cohorts
    cohorts: CohortArena,

    /// Committed history
    history: StockHistory,

    /// Whether cohort snapshots are kept per period
    record_cohorts: bool,
}

impl Stock {
    /// Create an empty stock
    ///
    /// # Example
    /// ```
    /// use mfa_core_rs::{lifetime::LifetimeDistribution, Stock};
    ///
    /// let stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 2.0 });
    /// assert_eq!(stock.level(), 0.0);
    /// assert_eq!(stock.next_period(), 0);
    /// ```
    pub fn new(process_id: impl Into<String>, distribution: LifetimeDistribution) -> Self {
        Self {
            process_id: process_id.into(),
            distribution,
            curve: None,
            cohorts: CohortArena::new(),
            history: StockHistory::default(),
            record_cohorts: true,
        }
    }

    pub fn with_cohort_recording(mut self, record: bool) -> Self {
        self.record_cohorts = record;
        self
    }

    /// Attach a precomputed survival curve
    pub(crate) fn attach_curve(&mut self, curve: Arc<[f64]>) {
        self.curve = Some(curve);
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn distribution(&self) -> &LifetimeDistribution {
        &self.distribution
    }

    /// Survival at `age`, from the attached curve when it covers the age
    pub fn survival(&self, age: usize) -> f64 {
        match &self.curve {
            Some(curve) if age < curve.len() => curve[age],
            _ => self.distribution.survival(age),
        }
    }

    /// Current accumulated level
    pub fn level(&self) -> f64 {
        self.history.level.last().copied().unwrap_or(0.0)
    }

    /// Next period this stock expects to be advanced to
    pub fn next_period(&self) -> usize {
        self.history.level.len()
    }

    /// Check if period `t` has already been committed
    pub fn is_advanced(&self, t: usize) -> bool {
        t < self.next_period()
    }

    pub fn cohorts(&self) -> &CohortArena {
        &self.cohorts
    }

    pub fn history(&self) -> &StockHistory {
        &self.history
    }

    /// Outflow committed for period `t`
    pub fn outflow(&self, t: usize) -> Option<f64> {
        self.history.outflow.get(t).copied()
    }

    /// Inflow committed for period `t`
    pub fn inflow(&self, t: usize) -> Option<f64> {
        self.history.inflow.get(t).copied()
    }

    /// Apply a fully computed step
    pub(crate) fn commit(&mut self, step: &StockStep, cohorts: &[Cohort]) {
        self.cohorts.replace(cohorts);
        self.history.inflow.push(step.inflow);
        self.history.outflow.push(step.outflow);
        self.history.level.push(step.level);
        if self.record_cohorts {
            self.history.cohorts.push(cohorts.to_vec());
        }
    }
}
