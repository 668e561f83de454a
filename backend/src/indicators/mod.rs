//! Indicators
//!
//! Read-only time series aggregated from a solved graph, such as the total
//! inflow to a process or the net change of a stock. Each indicator scales
//! its aggregate by a conversion factor (e.g. carbon content per unit mass).
//!
//! Indicators are computed once, after every period of a scenario has been
//! solved, and never change afterwards.

use crate::models::graph::{MaterialGraph, ModelError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What an indicator aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorSource {
    /// Sum of all inflows to a process
    ProcessInflow { process: String },
    /// Sum of all outflows from a process
    ProcessOutflow { process: String },
    /// Stock level at the end of each period
    StockLevel { process: String },
    StockInflow { process: String },
    StockOutflow { process: String },
    /// Stock inflow minus stock outflow
    NetStockChange { process: String },
    /// Sum of the listed flows
    FlowSum { flows: Vec<String> },
}

fn default_factor() -> f64 {
    1.0
}

/// Definition of an indicator, supplied with the scenario input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub unit: String,
    /// Multiplier applied to every aggregated value
    #[serde(default = "default_factor")]
    pub factor: f64,
    pub source: IndicatorSource,
}

impl IndicatorSpec {
    pub fn new(id: &str, label: &str, source: IndicatorSource) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            unit: String::new(),
            factor: 1.0,
            source,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Check that every referenced process, stock or flow exists
    pub fn validate(&self, graph: &MaterialGraph) -> Result<(), ModelError> {
        let missing = |entity: &'static str, id: &str| ModelError::UnknownIndicatorReference {
            indicator: self.id.clone(),
            entity,
            missing: id.to_string(),
        };

        match &self.source {
            IndicatorSource::ProcessInflow { process } | IndicatorSource::ProcessOutflow { process } => {
                if graph.get_process(process).is_none() {
                    return Err(missing("process", process));
                }
            }
            IndicatorSource::StockLevel { process }
            | IndicatorSource::StockInflow { process }
            | IndicatorSource::StockOutflow { process }
            | IndicatorSource::NetStockChange { process } => {
                if graph.get_stock(process).is_none() {
                    return Err(missing("stock", process));
                }
            }
            IndicatorSource::FlowSum { flows } => {
                if let Some(flow) = flows.iter().find(|f| graph.get_flow(f).is_none()) {
                    return Err(missing("flow", flow));
                }
            }
        }
        Ok(())
    }
}

/// Errors raised while aggregating an indicator
#[derive(Debug, Error, PartialEq)]
pub enum IndicatorError {
    #[error("Indicator '{indicator}' has no value for period {period}")]
    Unresolved { indicator: String, period: usize },
}

/// Aggregated, read-only time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    id: String,
    label: String,
    unit: String,
    values: Vec<f64>,
}

impl Indicator {
    /// Aggregate `spec` over every period of a solved graph
    ///
    /// # Errors
    /// `IndicatorError::Unresolved` if any period still has an unknown term
    pub fn compute(spec: &IndicatorSpec, graph: &MaterialGraph) -> Result<Self, IndicatorError> {
        let values = (0..graph.periods())
            .map(|t| {
                aggregate(&spec.source, graph, t)
                    .map(|v| v * spec.factor)
                    .ok_or_else(|| IndicatorError::Unresolved {
                        indicator: spec.id.clone(),
                        period: t,
                    })
            })
            .collect::<Result<Vec<f64>, IndicatorError>>()?;

        Ok(Self {
            id: spec.id.clone(),
            label: spec.label.clone(),
            unit: spec.unit.clone(),
            values,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value for period `t`
    pub fn value(&self, t: usize) -> Option<f64> {
        self.values.get(t).copied()
    }

    /// Sum over the whole horizon
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

fn aggregate(source: &IndicatorSource, graph: &MaterialGraph, t: usize) -> Option<f64> {
    match source {
        IndicatorSource::ProcessInflow { process } => graph.inflow_sum(process, t),
        IndicatorSource::ProcessOutflow { process } => graph.outflow_sum(process, t),
        IndicatorSource::StockLevel { process } => {
            graph.get_stock(process)?.history().level.get(t).copied()
        }
        IndicatorSource::StockInflow { process } => graph.get_stock(process)?.inflow(t),
        IndicatorSource::StockOutflow { process } => graph.get_stock(process)?.outflow(t),
        IndicatorSource::NetStockChange { process } => graph.accumulation(process, t),
        IndicatorSource::FlowSum { flows } => flows
            .iter()
            .map(|id| graph.get_flow(id)?.value(t).value())
            .sum(),
    }
}
