//! Stock Dynamics Engine
//!
//! Advances cohort-based stocks one period at a time. For a stock receiving
//! `inflow_t` in period `t`:
//!
//! ```text
//! for every live cohort (entry e, initial i, remaining r):
//!     r' = min(r, i * survival(t - e))
//!     outflow += r - r'
//! append cohort (t, inflow_t, inflow_t)      // age 0, no outflow
//! level_t = level_{t-1} + inflow_t - outflow_t
//! ```
//!
//! Cohorts whose remaining mass falls to the negligible threshold are
//! retired: their residue is added to the period's outflow and the cohort
//! is dropped, which bounds memory on long horizons while keeping the
//! cohort sum equal to the level.
//!
//! # Critical Invariants
//!
//! - **Atomicity**: a step is computed in full before anything is committed;
//!   a rejected step leaves the stock untouched
//! - **Conservation**: `level_t = level_{t-1} + inflow_t - outflow_t`
//! - **Bounds**: `0 <= outflow_t <= level_{t-1}`
//! - **Ordering**: periods are advanced strictly in increasing order

use crate::models::stock::{Cohort, Stock, StockStep};
use thiserror::Error;
use tracing::trace;

/// Errors that can occur while advancing a stock
#[derive(Debug, Error, PartialEq)]
pub enum StockError {
    #[error("Invalid inflow {value} to stock at '{process}' in period {period}")]
    InvalidFlowValue {
        process: String,
        period: usize,
        value: f64,
    },

    #[error("Stock at '{process}' expects period {expected}, got {actual}")]
    OutOfOrder {
        process: String,
        expected: usize,
        actual: usize,
    },
}

/// Default mass below which a cohort is retired
pub const DEFAULT_NEGLIGIBLE_MASS: f64 = 1e-10;

/// Advances stocks period by period
///
/// # Example
///
/// ```rust
/// use mfa_core_rs::dynamics::StockEngine;
/// use mfa_core_rs::lifetime::LifetimeDistribution;
/// use mfa_core_rs::Stock;
///
/// let engine = StockEngine::default();
/// let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 2.0 });
///
/// let outflows: Vec<f64> = [10.0, 10.0, 10.0, 0.0]
///     .iter()
///     .enumerate()
///     .map(|(t, &inflow)| engine.advance(&mut stock, inflow, t).unwrap().outflow)
///     .collect();
///
/// assert_eq!(outflows, vec![0.0, 0.0, 10.0, 10.0]);
/// assert_eq!(stock.history().level, vec![10.0, 20.0, 20.0, 10.0]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StockEngine {
    negligible_mass: f64,
}

impl Default for StockEngine {
    fn default() -> Self {
        Self::new(DEFAULT_NEGLIGIBLE_MASS)
    }
}

impl StockEngine {
    pub fn new(negligible_mass: f64) -> Self {
        Self { negligible_mass }
    }

    pub fn negligible_mass(&self) -> f64 {
        self.negligible_mass
    }

    /// Advance `stock` to period `t` with the given inflow
    ///
    /// # Returns
    ///
    /// The committed step (inflow, outflow, level, retired mass)
    ///
    /// # Errors
    ///
    /// - `InvalidFlowValue` if `inflow` is negative or not finite
    /// - `OutOfOrder` if `t` is not the stock's next period
    pub fn advance(&self, stock: &mut Stock, inflow: f64, t: usize) -> Result<StockStep, StockError> {
        if !inflow.is_finite() || inflow < 0.0 {
            return Err(StockError::InvalidFlowValue {
                process: stock.process_id().to_string(),
                period: t,
                value: inflow,
            });
        }
        check_order(stock, t)?;

        let (step, next) = self.compute(stock, inflow, t);

        trace!(
            process = stock.process_id(),
            period = t,
            inflow,
            outflow = step.outflow,
            level = step.level,
            cohorts = next.len(),
            "stock advanced"
        );

        stock.commit(&step, &next);
        Ok(step)
    }

    /// Outflow the stock will release in period `t`, without advancing it
    ///
    /// The cohort entering at `t` has age 0 and releases nothing, so the
    /// outflow depends only on earlier cohorts. The value is bit-identical
    /// to the outflow a later `advance(stock, _, t)` produces.
    pub fn preview_outflow(&self, stock: &Stock, t: usize) -> Result<f64, StockError> {
        check_order(stock, t)?;
        Ok(self.compute(stock, 0.0, t).0.outflow)
    }

    fn compute(&self, stock: &Stock, inflow: f64, t: usize) -> (StockStep, Vec<Cohort>) {
        let mut next: Vec<Cohort> = Vec::with_capacity(stock.cohorts().live() + 1);
        let mut outflow = 0.0;
        let mut retired = 0.0;

        for cohort in stock.cohorts().iter() {
            let age = t - cohort.entry;
            let target = (cohort.initial * stock.survival(age)).min(cohort.remaining);
            outflow += cohort.remaining - target;

            if target <= self.negligible_mass {
                retired += target;
                outflow += target;
            } else {
                next.push(Cohort {
                    remaining: target,
                    ..*cohort
                });
            }
        }

        if inflow > 0.0 {
            next.push(Cohort {
                entry: t,
                initial: inflow,
                remaining: inflow,
            });
        }

        let step = StockStep {
            period: t,
            inflow,
            outflow,
            level: next.iter().map(|c| c.remaining).sum(),
            retired,
        };
        (step, next)
    }

    /// Drive a stock through a whole inflow series starting at its next period
    pub fn run(&self, stock: &mut Stock, inflows: &[f64]) -> Result<Vec<StockStep>, StockError> {
        let start = stock.next_period();
        inflows
            .iter()
            .enumerate()
            .map(|(offset, &inflow)| self.advance(stock, inflow, start + offset))
            .collect()
    }
}

fn check_order(stock: &Stock, t: usize) -> Result<(), StockError> {
    if t == stock.next_period() {
        Ok(())
    } else {
        Err(StockError::OutOfOrder {
            process: stock.process_id().to_string(),
            expected: stock.next_period(),
            actual: t,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifetime::LifetimeDistribution;

    fn fixed(lifetime: f64) -> Stock {
        Stock::new("S", LifetimeDistribution::Fixed { lifetime })
    }

    #[test]
    fn test_new_cohort_has_no_outflow() {
        let engine = StockEngine::default();
        let mut stock = fixed(1.0);
        let step = engine.advance(&mut stock, 5.0, 0).unwrap();
        assert_eq!(step.outflow, 0.0);
        assert_eq!(step.level, 5.0);
        assert_eq!(stock.cohorts().live(), 1);
    }

    #[test]
    fn test_negative_inflow_leaves_stock_untouched() {
        let engine = StockEngine::default();
        let mut stock = fixed(3.0);
        engine.advance(&mut stock, 4.0, 0).unwrap();

        let result = engine.advance(&mut stock, -1.0, 1);
        assert_eq!(
            result,
            Err(StockError::InvalidFlowValue {
                process: "S".to_string(),
                period: 1,
                value: -1.0
            })
        );
        assert_eq!(stock.next_period(), 1);
        assert_eq!(stock.level(), 4.0);
        assert_eq!(stock.cohorts().live(), 1);

        assert!(engine.advance(&mut stock, f64::NAN, 1).is_err());
        assert_eq!(stock.next_period(), 1);
    }

    #[test]
    fn test_out_of_order_period() {
        let engine = StockEngine::default();
        let mut stock = fixed(3.0);
        assert_eq!(
            engine.advance(&mut stock, 1.0, 2),
            Err(StockError::OutOfOrder {
                process: "S".to_string(),
                expected: 0,
                actual: 2
            })
        );
    }

    #[test]
    fn test_retired_cohorts_are_dropped() {
        let engine = StockEngine::default();
        let mut stock = fixed(1.0);
        engine.run(&mut stock, &[3.0, 0.0, 0.0]).unwrap();
        assert_eq!(stock.cohorts().live(), 0);
        assert_eq!(stock.history().outflow, vec![0.0, 3.0, 0.0]);
    }

    #[test]
    fn test_negligible_residue_goes_to_outflow() {
        let engine = StockEngine::new(0.5);
        let mut stock = Stock::new(
            "S",
            LifetimeDistribution::Table {
                survival: vec![1.0, 0.1],
            },
        );
        engine.advance(&mut stock, 4.0, 0).unwrap();
        let step = engine.advance(&mut stock, 0.0, 1).unwrap();
        // 4.0 * 0.1 = 0.4 is below the threshold and retires at once
        assert!((step.outflow - 4.0).abs() < 1e-12);
        assert!((step.retired - 0.4).abs() < 1e-12);
        assert_eq!(step.level, 0.0);
    }

    #[test]
    fn test_preview_matches_advance() {
        let engine = StockEngine::default();
        let mut stock = Stock::new(
            "S",
            LifetimeDistribution::Weibull {
                shape: 1.5,
                scale: 3.0,
            },
        );
        engine.run(&mut stock, &[7.0, 3.5, 1.25]).unwrap();

        let preview = engine.preview_outflow(&stock, 3).unwrap();
        assert_eq!(stock.next_period(), 3);
        let step = engine.advance(&mut stock, 9.0, 3).unwrap();
        assert_eq!(preview.to_bits(), step.outflow.to_bits());
    }

    #[test]
    fn test_zero_inflow_adds_no_cohort() {
        let engine = StockEngine::default();
        let mut stock = fixed(5.0);
        engine.advance(&mut stock, 0.0, 0).unwrap();
        assert_eq!(stock.cohorts().live(), 0);
        assert_eq!(stock.level(), 0.0);
    }
}
