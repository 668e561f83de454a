//! Scenario input
//!
//! A `ScenarioInput` is the fully validated description of one flow system
//! handed over by data ingestion: processes, flows with their known values,
//! stocks with their lifetime distributions, and indicator definitions.
//! Inputs are immutable once built; every solve constructs fresh state from
//! them, which keeps scenarios isolated and solves reproducible.
//!
//! Alternative scenarios are derived from a baseline by applying
//! [`FlowModifier`]s to its given values.

use crate::core::time::Horizon;
use crate::indicators::IndicatorSpec;
use crate::lifetime::LifetimeDistribution;
use crate::models::graph::ModelError;
use serde::{Deserialize, Serialize};

/// Process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub id: String,
    pub label: String,
    /// Whether a stock accumulates at this process
    #[serde(default)]
    pub stock: bool,
}

/// Values of a flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowValues {
    /// One entry per period; `None` marks an unknown to be solved
    Absolute { values: Vec<Option<f64>> },
    /// One share of the origin's total outflow per period
    Relative { shares: Vec<f64> },
}

/// Flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Defaults to `"{origin}->{destination}"`
    #[serde(default)]
    pub id: Option<String>,
    pub origin: String,
    pub destination: String,
    #[serde(flatten)]
    pub values: FlowValues,
}

impl FlowSpec {
    /// Absolute flow definition
    pub fn absolute(origin: &str, destination: &str, values: Vec<Option<f64>>) -> Self {
        Self {
            id: None,
            origin: origin.to_string(),
            destination: destination.to_string(),
            values: FlowValues::Absolute { values },
        }
    }

    /// Relative flow definition
    pub fn relative(origin: &str, destination: &str, shares: Vec<f64>) -> Self {
        Self {
            id: None,
            origin: origin.to_string(),
            destination: destination.to_string(),
            values: FlowValues::Relative { shares },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    /// Effective flow identifier
    pub fn flow_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("{}->{}", self.origin, self.destination))
    }
}

/// Stock definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSpec {
    /// Owning (stock-bearing) process
    pub process: String,
    pub lifetime: LifetimeDistribution,
}

/// How a modifier changes given values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueChange {
    /// Scale by `1 + percent / 100`
    Proportional { percent: f64 },
    /// Add `delta`
    Absolute { delta: f64 },
    /// Move linearly from the value at `start` to `value` at `end`
    Target { value: f64 },
}

/// Change applied to the given values of one flow over a period range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowModifier {
    pub flow: String,
    /// First period affected
    pub start: usize,
    /// Last period affected (inclusive)
    pub end: usize,
    pub change: ValueChange,
}

/// Complete, validated input of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub name: String,
    pub horizon: Horizon,
    pub processes: Vec<ProcessSpec>,
    pub flows: Vec<FlowSpec>,
    #[serde(default)]
    pub stocks: Vec<StockSpec>,
    #[serde(default)]
    pub indicators: Vec<IndicatorSpec>,
}

impl ScenarioInput {
    /// Start an input with no entities
    pub fn new(name: impl Into<String>, horizon: Horizon) -> Self {
        Self {
            name: name.into(),
            horizon,
            processes: Vec::new(),
            flows: Vec::new(),
            stocks: Vec::new(),
            indicators: Vec::new(),
        }
    }

    pub fn process(mut self, id: &str, label: &str) -> Self {
        self.processes.push(ProcessSpec {
            id: id.to_string(),
            label: label.to_string(),
            stock: false,
        });
        self
    }

    /// Add a stock-bearing process together with its stock
    pub fn stock_process(mut self, id: &str, label: &str, lifetime: LifetimeDistribution) -> Self {
        self.processes.push(ProcessSpec {
            id: id.to_string(),
            label: label.to_string(),
            stock: true,
        });
        self.stocks.push(StockSpec {
            process: id.to_string(),
            lifetime,
        });
        self
    }

    pub fn flow(mut self, spec: FlowSpec) -> Self {
        self.flows.push(spec);
        self
    }

    pub fn indicator(mut self, spec: IndicatorSpec) -> Self {
        self.indicators.push(spec);
        self
    }

    /// Derive an alternative scenario by modifying given values
    ///
    /// # Errors
    /// `ModelError::InvalidModifier` if a modifier names an unknown flow, an
    /// empty or out-of-horizon range, a relative flow, or a period whose
    /// value is not given; `ModelError::Flow` if a modified value would
    /// become negative.
    pub fn derive(
        &self,
        name: impl Into<String>,
        modifiers: &[FlowModifier],
    ) -> Result<ScenarioInput, ModelError> {
        let mut derived = self.clone();
        derived.name = name.into();

        for modifier in modifiers {
            let invalid = |reason: &str| ModelError::InvalidModifier {
                flow: modifier.flow.clone(),
                reason: reason.to_string(),
            };

            if modifier.start > modifier.end || modifier.end >= self.horizon.len() {
                return Err(invalid("period range is empty or outside the horizon"));
            }

            let spec = derived
                .flows
                .iter_mut()
                .find(|f| f.flow_id() == modifier.flow)
                .ok_or_else(|| invalid("no such flow"))?;

            let values = match &mut spec.values {
                FlowValues::Absolute { values } => values,
                FlowValues::Relative { .. } => {
                    return Err(invalid("relative flows have no given values"))
                }
            };

            let base = values
                .get(modifier.start)
                .copied()
                .flatten()
                .ok_or_else(|| invalid("start period has no given value"))?;
            let span = (modifier.end - modifier.start) as f64;

            for t in modifier.start..=modifier.end {
                let current = values
                    .get(t)
                    .copied()
                    .flatten()
                    .ok_or_else(|| invalid("period has no given value"))?;
                let updated = match &modifier.change {
                    ValueChange::Proportional { percent } => current * (1.0 + percent / 100.0),
                    ValueChange::Absolute { delta } => current + delta,
                    ValueChange::Target { value } => {
                        if span == 0.0 {
                            *value
                        } else {
                            let progress = (t - modifier.start) as f64 / span;
                            base + (value - base) * progress
                        }
                    }
                };
                if !updated.is_finite() || updated < 0.0 {
                    return Err(ModelError::Flow(crate::models::flow::FlowError::InvalidValue {
                        flow: modifier.flow.clone(),
                        period: t,
                        value: updated,
                    }));
                }
                values[t] = Some(updated);
            }
        }

        Ok(derived)
    }
}
