//! Flow model
//!
//! Represents a directed material flow between two processes.
//! Each flow has:
//! - Origin and destination process IDs
//! - A kind: absolute values or a share of the origin's total outflow
//! - One value per period, each either unknown, given or computed
//!
//! # Critical Invariants
//!
//! 1. A given value is never overwritten
//! 2. A computed value is written exactly once per period
//! 3. Values are finite and non-negative

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when writing flow values
#[derive(Debug, Error, PartialEq)]
pub enum FlowError {
    #[error("Invalid value {value} for flow {flow} in period {period}")]
    InvalidValue {
        flow: String,
        period: usize,
        value: f64,
    },

    #[error("Flow {flow} already has a value for period {period}")]
    AlreadyResolved { flow: String, period: usize },

    #[error("Period {period} is outside the horizon of flow {flow} ({len} periods)")]
    PeriodOutOfRange {
        flow: String,
        period: usize,
        len: usize,
    },
}

/// Value of a flow in one period, with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provenance", content = "value", rename_all = "snake_case")]
pub enum FlowValue {
    /// Not yet known
    Unknown,
    /// Supplied by the input data
    Given(f64),
    /// Derived by the propagator or the stock engine
    Computed(f64),
}

impl FlowValue {
    /// Numeric value, if known
    pub fn value(&self) -> Option<f64> {
        match self {
            FlowValue::Unknown => None,
            FlowValue::Given(v) | FlowValue::Computed(v) => Some(*v),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FlowValue::Unknown)
    }

    pub fn is_given(&self) -> bool {
        matches!(self, FlowValue::Given(_))
    }
}

/// How a flow's magnitude is specified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowKind {
    /// Values are absolute quantities (given or solved)
    Absolute,
    /// Values are a per-period share of the origin's total outflow
    Relative { shares: Vec<f64> },
}

/// A directed, time-indexed material flow
///
/// # Example
/// ```
/// use mfa_core_rs::{Flow, FlowValue};
///
/// let mut flow = Flow::absolute("A->B", "A", "B", 3);
/// flow.set_given(0, 10.0).unwrap();
/// flow.set_computed(1, 12.0, 1e-9).unwrap();
///
/// assert_eq!(flow.value(0), FlowValue::Given(10.0));
/// assert_eq!(flow.value(1), FlowValue::Computed(12.0));
/// assert_eq!(flow.value(2), FlowValue::Unknown);
/// assert!(flow.set_computed(0, 11.0, 1e-9).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    /// Unique flow identifier
    id: String,

    /// Origin process ID
    origin: String,

    /// Destination process ID
    destination: String,

    /// Absolute or relative
    kind: FlowKind,

    /// One entry per period of the horizon
    values: Vec<FlowValue>,
}

impl Flow {
    /// Create an absolute flow with all periods unknown
    pub fn absolute(
        id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        periods: usize,
    ) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
            destination: destination.into(),
            kind: FlowKind::Absolute,
            values: vec![FlowValue::Unknown; periods],
        }
    }

    /// Create a relative flow; one share per period
    pub fn relative(
        id: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        shares: Vec<f64>,
    ) -> Self {
        let periods = shares.len();
        Self {
            id: id.into(),
            origin: origin.into(),
            destination: destination.into(),
            kind: FlowKind::Relative { shares },
            values: vec![FlowValue::Unknown; periods],
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn kind(&self) -> &FlowKind {
        &self.kind
    }

    /// Number of periods covered
    pub fn periods(&self) -> usize {
        self.values.len()
    }

    /// Value and provenance at period `t` (`Unknown` outside the horizon)
    pub fn value(&self, t: usize) -> FlowValue {
        self.values.get(t).copied().unwrap_or(FlowValue::Unknown)
    }

    /// All period values
    pub fn values(&self) -> &[FlowValue] {
        &self.values
    }

    /// Share of the origin's outflow at `t`, for relative flows
    pub fn share(&self, t: usize) -> Option<f64> {
        match &self.kind {
            FlowKind::Absolute => None,
            FlowKind::Relative { shares } => shares.get(t).copied(),
        }
    }

    pub fn is_relative(&self) -> bool {
        matches!(self.kind, FlowKind::Relative { .. })
    }

    /// Check if every period has a value
    pub fn is_fully_resolved(&self) -> bool {
        self.values.iter().all(FlowValue::is_known)
    }

    /// Record an input value for period `t`
    ///
    /// # Errors
    /// - `InvalidValue` if `value` is negative or not finite
    /// - `AlreadyResolved` if the period already has a value
    pub fn set_given(&mut self, t: usize, value: f64) -> Result<(), FlowError> {
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(t, value));
        }
        let slot = self.slot(t)?;
        *slot = FlowValue::Given(value);
        Ok(())
    }

    /// Record a solved value for period `t`
    ///
    /// Negative values within `tolerance` of zero are clamped to zero;
    /// anything more negative is rejected rather than silently fixed.
    ///
    /// # Returns
    /// The value actually stored
    pub fn set_computed(&mut self, t: usize, value: f64, tolerance: f64) -> Result<f64, FlowError> {
        if !value.is_finite() || value < -tolerance {
            return Err(self.invalid(t, value));
        }
        let value = value.max(0.0);
        let slot = self.slot(t)?;
        *slot = FlowValue::Computed(value);
        Ok(value)
    }

    fn slot(&mut self, t: usize) -> Result<&mut FlowValue, FlowError> {
        let len = self.values.len();
        let id = &self.id;
        match self.values.get_mut(t) {
            None => Err(FlowError::PeriodOutOfRange {
                flow: id.clone(),
                period: t,
                len,
            }),
            Some(slot) if slot.is_known() => Err(FlowError::AlreadyResolved {
                flow: id.clone(),
                period: t,
            }),
            Some(slot) => Ok(slot),
        }
    }

    fn invalid(&self, t: usize, value: f64) -> FlowError {
        FlowError::InvalidValue {
            flow: self.id.clone(),
            period: t,
            value,
        }
    }
}
