//! Lifetime (survival) distributions for stock cohorts.
//!
//! A cohort entering a stock at period `e` still holds
//! `initial * survival(t - e)` at period `t`. The distribution families form
//! a closed set; each evaluates `survival(age)` directly.
//!
//! # Conventions
//!
//! 1. `survival(0) = 1` for every family: mass entering at `t` never leaves
//!    in the same period.
//! 2. For `age >= 1` the family's survival function is used, clamped into
//!    `[0, 1]`. All families are non-increasing in age.
//!
//! # Example
//!
//! ```
//! use mfa_core_rs::lifetime::LifetimeDistribution;
//!
//! let fixed = LifetimeDistribution::Fixed { lifetime: 2.0 };
//! assert_eq!(fixed.survival(0), 1.0);
//! assert_eq!(fixed.survival(1), 1.0);
//! assert_eq!(fixed.survival(2), 0.0);
//! ```

mod cache;

pub use cache::SurvivalCache;

use serde::{Deserialize, Serialize};
use std::f64::consts::SQRT_2;
use thiserror::Error;

/// Invalid distribution parameters
#[derive(Debug, Error, PartialEq)]
pub enum LifetimeError {
    #[error("{family} lifetime parameter `{parameter}` must be {requirement}, got {value}")]
    InvalidParameter {
        family: &'static str,
        parameter: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("survival table must not be empty")]
    EmptyTable,

    #[error("survival table entry {age} = {value} is outside [0, 1]")]
    TableOutOfRange { age: usize, value: f64 },

    #[error("survival table increases at age {age}")]
    TableIncreasing { age: usize },

    #[error("survival table must start at 1.0, got {value}")]
    TableStart { value: f64 },
}

/// Lifetime distribution families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum LifetimeDistribution {
    /// Every unit leaves exactly when its age reaches `lifetime`
    Fixed { lifetime: f64 },

    /// Normally distributed lifetime
    Normal { mean: f64, std_dev: f64 },

    /// Weibull lifetime with shape `k` and scale `lambda`
    Weibull { shape: f64, scale: f64 },

    /// Log-normal lifetime; `mean` and `std_dev` describe the lifetime itself,
    /// not the underlying normal
    LogNormal { mean: f64, std_dev: f64 },

    /// Normal lifetime folded at zero
    FoldedNormal { mean: f64, std_dev: f64 },

    /// Discretized survival values indexed by age; zero beyond the table
    Table { survival: Vec<f64> },
}

impl LifetimeDistribution {
    /// Check the parameters of the family
    pub fn validate(&self) -> Result<(), LifetimeError> {
        match self {
            LifetimeDistribution::Fixed { lifetime } => {
                require("fixed", "lifetime", "finite and >= 0", *lifetime, |v| v >= 0.0)
            }
            LifetimeDistribution::Normal { mean, std_dev } => {
                require("normal", "mean", "finite", *mean, |_| true)?;
                require("normal", "std_dev", "finite and > 0", *std_dev, |v| v > 0.0)
            }
            LifetimeDistribution::Weibull { shape, scale } => {
                require("weibull", "shape", "finite and > 0", *shape, |v| v > 0.0)?;
                require("weibull", "scale", "finite and > 0", *scale, |v| v > 0.0)
            }
            LifetimeDistribution::LogNormal { mean, std_dev } => {
                require("log_normal", "mean", "finite and > 0", *mean, |v| v > 0.0)?;
                require("log_normal", "std_dev", "finite and > 0", *std_dev, |v| v > 0.0)
            }
            LifetimeDistribution::FoldedNormal { mean, std_dev } => {
                require("folded_normal", "mean", "finite", *mean, |_| true)?;
                require("folded_normal", "std_dev", "finite and > 0", *std_dev, |v| v > 0.0)
            }
            LifetimeDistribution::Table { survival } => {
                let first = *survival.first().ok_or(LifetimeError::EmptyTable)?;
                for (age, &value) in survival.iter().enumerate() {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(LifetimeError::TableOutOfRange { age, value });
                    }
                    if age > 0 && value > survival[age - 1] {
                        return Err(LifetimeError::TableIncreasing { age });
                    }
                }
                if first != 1.0 {
                    return Err(LifetimeError::TableStart { value: first });
                }
                Ok(())
            }
        }
    }

    /// Share of a cohort still in stock at `age` periods after entry
    pub fn survival(&self, age: usize) -> f64 {
        if age == 0 {
            return 1.0;
        }
        let x = age as f64;
        let value = match self {
            LifetimeDistribution::Fixed { lifetime } => {
                if x < *lifetime {
                    1.0
                } else {
                    0.0
                }
            }
            LifetimeDistribution::Normal { mean, std_dev } => {
                0.5 * libm::erfc((x - mean) / (std_dev * SQRT_2))
            }
            LifetimeDistribution::Weibull { shape, scale } => (-(x / scale).powf(*shape)).exp(),
            LifetimeDistribution::LogNormal { mean, std_dev } => {
                let sigma_sq = (1.0 + (std_dev / mean).powi(2)).ln();
                let mu = mean.ln() - sigma_sq / 2.0;
                0.5 * libm::erfc((x.ln() - mu) / (sigma_sq.sqrt() * SQRT_2))
            }
            LifetimeDistribution::FoldedNormal { mean, std_dev } => {
                let scale = std_dev * SQRT_2;
                1.0 - 0.5 * (libm::erf((x - mean) / scale) + libm::erf((x + mean) / scale))
            }
            LifetimeDistribution::Table { survival } => survival.get(age).copied().unwrap_or(0.0),
        };
        value.clamp(0.0, 1.0)
    }

    /// Survival values for ages `0..len`
    pub fn survival_curve(&self, len: usize) -> Vec<f64> {
        let mut curve: Vec<f64> = (0..len).map(|age| self.survival(age)).collect();
        // erfc rounding can produce tiny upticks far in the tail
        for age in 1..curve.len() {
            if curve[age] > curve[age - 1] {
                curve[age] = curve[age - 1];
            }
        }
        curve
    }

    /// Family name used in diagnostics
    pub fn family(&self) -> &'static str {
        match self {
            LifetimeDistribution::Fixed { .. } => "fixed",
            LifetimeDistribution::Normal { .. } => "normal",
            LifetimeDistribution::Weibull { .. } => "weibull",
            LifetimeDistribution::LogNormal { .. } => "log_normal",
            LifetimeDistribution::FoldedNormal { .. } => "folded_normal",
            LifetimeDistribution::Table { .. } => "table",
        }
    }

    /// Identity of the family and its exact parameters
    pub(crate) fn key(&self) -> DistributionKey {
        let params = match self {
            LifetimeDistribution::Fixed { lifetime } => vec![lifetime.to_bits()],
            LifetimeDistribution::Normal { mean, std_dev }
            | LifetimeDistribution::LogNormal { mean, std_dev }
            | LifetimeDistribution::FoldedNormal { mean, std_dev } => {
                vec![mean.to_bits(), std_dev.to_bits()]
            }
            LifetimeDistribution::Weibull { shape, scale } => {
                vec![shape.to_bits(), scale.to_bits()]
            }
            LifetimeDistribution::Table { survival } => {
                survival.iter().map(|v| v.to_bits()).collect()
            }
        };
        DistributionKey {
            family: self.family(),
            params,
        }
    }
}

/// Hashable (family, parameter bits) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct DistributionKey {
    family: &'static str,
    params: Vec<u64>,
}

fn require(
    family: &'static str,
    parameter: &'static str,
    requirement: &'static str,
    value: f64,
    check: impl Fn(f64) -> bool,
) -> Result<(), LifetimeError> {
    if value.is_finite() && check(value) {
        Ok(())
    } else {
        Err(LifetimeError::InvalidParameter {
            family,
            parameter,
            requirement,
            value,
        })
    }
}
