//! Material flow graph
//!
//! Holds every entity of one scenario: processes, flows and stocks over a
//! common horizon. Built once from a [`ScenarioInput`], filled in place by
//! the solver, and read-only afterwards.
//!
//! # Critical Invariants
//!
//! 1. **Referential integrity**: every flow names existing origin and
//!    destination processes; every stock names an existing process
//! 2. **Stock ownership**: each stock-bearing process owns exactly one stock,
//!    and only stock-bearing processes own stocks
//! 3. **Horizon**: every flow has exactly one value slot per period
//! 4. **Shares**: relative shares of one origin sum to at most 1 per period

use crate::core::time::Horizon;
use crate::indicators::IndicatorSpec;
use crate::lifetime::{LifetimeError, SurvivalCache};
use crate::models::flow::{Flow, FlowError, FlowValue};
use crate::models::process::Process;
use crate::models::scenario::{FlowValues, ScenarioInput};
use crate::models::stock::Stock;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Slack allowed when checking that relative shares sum to at most one
const SHARE_SUM_SLACK: f64 = 1e-9;

/// Errors raised while building or mutating the entity model
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Referential integrity: {entity} '{id}' refers to unknown process '{missing}'")]
    ReferentialIntegrity {
        entity: &'static str,
        id: String,
        missing: String,
    },

    #[error("Scenario horizon has no periods")]
    EmptyHorizon,

    #[error("Duplicate {entity} id '{id}'")]
    DuplicateId { entity: &'static str, id: String },

    #[error("Flow '{flow}' starts and ends at process '{process}'")]
    SelfLoop { flow: String, process: String },

    #[error("Flow '{flow}' has {actual} periods, horizon has {expected}")]
    HorizonMismatch {
        flow: String,
        expected: usize,
        actual: usize,
    },

    #[error("Flow '{flow}' share {share} in period {period} is outside [0, 1]")]
    InvalidShare {
        flow: String,
        period: usize,
        share: f64,
    },

    #[error("Relative shares leaving process '{process}' sum to {total} in period {period}")]
    ShareOverflow {
        process: String,
        period: usize,
        total: f64,
    },

    #[error("Stock refers to process '{process}', which is not stock-bearing")]
    StockOnNonStockProcess { process: String },

    #[error("Stock-bearing process '{process}' has no stock")]
    MissingStock { process: String },

    #[error("Process '{process}' has more than one stock")]
    DuplicateStock { process: String },

    #[error("Stock-bearing process '{process}' has no outgoing flow to carry its outflow")]
    StockWithoutOutflow { process: String },

    #[error("Invalid lifetime for stock at '{process}': {source}")]
    InvalidLifetime {
        process: String,
        #[source]
        source: LifetimeError,
    },

    #[error("Invalid modifier for flow '{flow}': {reason}")]
    InvalidModifier { flow: String, reason: String },

    #[error("Indicator '{indicator}' refers to unknown {entity} '{missing}'")]
    UnknownIndicatorReference {
        indicator: String,
        entity: &'static str,
        missing: String,
    },

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Complete flow system of one scenario
///
/// # Example
///
/// ```rust
/// use mfa_core_rs::{FlowSpec, Horizon, MaterialGraph, ScenarioInput, SurvivalCache};
///
/// let input = ScenarioInput::new("demo", Horizon::with_periods(2))
///     .process("A", "Mining")
///     .process("B", "Use")
///     .flow(FlowSpec::absolute("A", "B", vec![Some(1.0), None]));
///
/// let graph = MaterialGraph::build(&input, &SurvivalCache::new(), true).unwrap();
/// assert_eq!(graph.num_processes(), 2);
/// assert_eq!(graph.num_flows(), 1);
/// assert_eq!(graph.unknown_count(1), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MaterialGraph {
    /// Periods of the scenario
    horizon: Horizon,

    /// All processes, indexed by ID
    processes: BTreeMap<String, Process>,

    /// All flows, indexed by ID
    flows: BTreeMap<String, Flow>,

    /// Stocks, indexed by owning process ID
    stocks: BTreeMap<String, Stock>,

    /// Indicator definitions carried through to aggregation
    indicators: Vec<IndicatorSpec>,
}

impl MaterialGraph {
    /// Build and validate the entity model of a scenario
    ///
    /// # Arguments
    ///
    /// * `input` - Scenario input
    /// * `cache` - Shared survival curves, attached to each stock
    /// * `record_cohorts` - Keep per-period cohort snapshots on stocks
    ///
    /// # Errors
    ///
    /// Any structural invariant violation, most notably
    /// `ModelError::ReferentialIntegrity`.
    pub fn build(
        input: &ScenarioInput,
        cache: &SurvivalCache,
        record_cohorts: bool,
    ) -> Result<Self, ModelError> {
        let periods = input.horizon.len();
        if periods == 0 {
            return Err(ModelError::EmptyHorizon);
        }

        let mut processes = BTreeMap::new();
        for spec in &input.processes {
            let mut process = Process::new(spec.id.clone(), spec.label.clone());
            if spec.stock {
                process = process.with_stock();
            }
            if processes.insert(spec.id.clone(), process).is_some() {
                return Err(ModelError::DuplicateId {
                    entity: "process",
                    id: spec.id.clone(),
                });
            }
        }

        let mut flows = BTreeMap::new();
        for spec in &input.flows {
            let id = spec.flow_id();
            for endpoint in [&spec.origin, &spec.destination] {
                if !processes.contains_key(endpoint) {
                    return Err(ModelError::ReferentialIntegrity {
                        entity: "flow",
                        id: id.clone(),
                        missing: endpoint.clone(),
                    });
                }
            }
            if spec.origin == spec.destination {
                return Err(ModelError::SelfLoop {
                    flow: id,
                    process: spec.origin.clone(),
                });
            }

            let flow = match &spec.values {
                FlowValues::Absolute { values } => {
                    check_periods(&id, periods, values.len())?;
                    let mut flow =
                        Flow::absolute(id.clone(), &spec.origin, &spec.destination, periods);
                    for (t, value) in values.iter().enumerate() {
                        if let Some(v) = value {
                            flow.set_given(t, *v)?;
                        }
                    }
                    flow
                }
                FlowValues::Relative { shares } => {
                    check_periods(&id, periods, shares.len())?;
                    for (period, &share) in shares.iter().enumerate() {
                        if !(0.0..=1.0).contains(&share) {
                            return Err(ModelError::InvalidShare {
                                flow: id.clone(),
                                period,
                                share,
                            });
                        }
                    }
                    Flow::relative(id.clone(), &spec.origin, &spec.destination, shares.clone())
                }
            };

            if flows.insert(id.clone(), flow).is_some() {
                return Err(ModelError::DuplicateId { entity: "flow", id });
            }
        }

        check_share_sums(&flows, periods)?;

        let mut stocks = BTreeMap::new();
        for spec in &input.stocks {
            let process = processes.get(&spec.process).ok_or_else(|| {
                ModelError::ReferentialIntegrity {
                    entity: "stock",
                    id: spec.process.clone(),
                    missing: spec.process.clone(),
                }
            })?;
            if !process.has_stock() {
                return Err(ModelError::StockOnNonStockProcess {
                    process: spec.process.clone(),
                });
            }
            spec.lifetime
                .validate()
                .map_err(|source| ModelError::InvalidLifetime {
                    process: spec.process.clone(),
                    source,
                })?;

            let mut stock = Stock::new(spec.process.clone(), spec.lifetime.clone())
                .with_cohort_recording(record_cohorts);
            stock.attach_curve(cache.curve(&spec.lifetime, periods + 1));
            if stocks.insert(spec.process.clone(), stock).is_some() {
                return Err(ModelError::DuplicateStock {
                    process: spec.process.clone(),
                });
            }
        }

        let origins: BTreeSet<&str> = flows.values().map(|f| f.origin()).collect();
        for process in processes.values().filter(|p| p.has_stock()) {
            if !stocks.contains_key(process.id()) {
                return Err(ModelError::MissingStock {
                    process: process.id().to_string(),
                });
            }
            if !origins.contains(process.id()) {
                return Err(ModelError::StockWithoutOutflow {
                    process: process.id().to_string(),
                });
            }
        }

        let graph = Self {
            horizon: input.horizon.clone(),
            processes,
            flows,
            stocks,
            indicators: input.indicators.clone(),
        };
        let mut indicator_ids = BTreeSet::new();
        for spec in &graph.indicators {
            if !indicator_ids.insert(spec.id.as_str()) {
                return Err(ModelError::DuplicateId {
                    entity: "indicator",
                    id: spec.id.clone(),
                });
            }
            spec.validate(&graph)?;
        }
        Ok(graph)
    }

    pub fn horizon(&self) -> &Horizon {
        &self.horizon
    }

    /// Number of periods
    pub fn periods(&self) -> usize {
        self.horizon.len()
    }

    pub fn get_process(&self, id: &str) -> Option<&Process> {
        self.processes.get(id)
    }

    pub fn get_flow(&self, id: &str) -> Option<&Flow> {
        self.flows.get(id)
    }

    pub fn get_flow_mut(&mut self, id: &str) -> Option<&mut Flow> {
        self.flows.get_mut(id)
    }

    pub fn get_stock(&self, process_id: &str) -> Option<&Stock> {
        self.stocks.get(process_id)
    }

    pub fn get_stock_mut(&mut self, process_id: &str) -> Option<&mut Stock> {
        self.stocks.get_mut(process_id)
    }

    pub fn processes(&self) -> &BTreeMap<String, Process> {
        &self.processes
    }

    pub fn flows(&self) -> &BTreeMap<String, Flow> {
        &self.flows
    }

    pub fn stocks(&self) -> &BTreeMap<String, Stock> {
        &self.stocks
    }

    pub fn indicator_specs(&self) -> &[IndicatorSpec] {
        &self.indicators
    }

    pub fn num_processes(&self) -> usize {
        self.processes.len()
    }

    pub fn num_flows(&self) -> usize {
        self.flows.len()
    }

    /// Number of flows without a value in period `t`
    pub fn unknown_count(&self, t: usize) -> usize {
        self.flows.values().filter(|f| !f.value(t).is_known()).count()
    }

    /// Sum of inflows to a process in period `t`, if all are known
    pub fn inflow_sum(&self, process_id: &str, t: usize) -> Option<f64> {
        self.flows
            .values()
            .filter(|f| f.destination() == process_id)
            .map(|f| f.value(t).value())
            .sum()
    }

    /// Sum of outflows from a process in period `t`, if all are known
    pub fn outflow_sum(&self, process_id: &str, t: usize) -> Option<f64> {
        self.flows
            .values()
            .filter(|f| f.origin() == process_id)
            .map(|f| f.value(t).value())
            .sum()
    }

    /// Stock accumulation at a process in period `t` (0 without a stock)
    pub fn accumulation(&self, process_id: &str, t: usize) -> Option<f64> {
        match self.stocks.get(process_id) {
            None => Some(0.0),
            Some(stock) => Some(stock.inflow(t)? - stock.outflow(t)?),
        }
    }

    /// `inflow - outflow - accumulation` for a process in period `t`
    ///
    /// `None` while any term is unknown.
    pub fn imbalance(&self, process_id: &str, t: usize) -> Option<f64> {
        Some(
            self.inflow_sum(process_id, t)? - self.outflow_sum(process_id, t)?
                - self.accumulation(process_id, t)?,
        )
    }

    /// Check if every flow has a value in every period
    pub fn is_fully_resolved(&self) -> bool {
        self.flows.values().all(Flow::is_fully_resolved)
    }

    /// Count values by provenance: (given, computed, unknown)
    pub fn provenance_counts(&self) -> (usize, usize, usize) {
        let mut counts = (0, 0, 0);
        for value in self.flows.values().flat_map(|f| f.values()) {
            match value {
                FlowValue::Given(_) => counts.0 += 1,
                FlowValue::Computed(_) => counts.1 += 1,
                FlowValue::Unknown => counts.2 += 1,
            }
        }
        counts
    }
}

fn check_periods(flow: &str, expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ModelError::HorizonMismatch {
            flow: flow.to_string(),
            expected,
            actual,
        })
    }
}

fn check_share_sums(flows: &BTreeMap<String, Flow>, periods: usize) -> Result<(), ModelError> {
    let mut per_origin: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for flow in flows.values().filter(|f| f.is_relative()) {
        let totals = per_origin
            .entry(flow.origin())
            .or_insert_with(|| vec![0.0; periods]);
        for (t, total) in totals.iter_mut().enumerate() {
            *total += flow.share(t).unwrap_or(0.0);
        }
    }
    for (process, totals) in per_origin {
        for (period, &total) in totals.iter().enumerate() {
            if total > 1.0 + SHARE_SUM_SLACK {
                return Err(ModelError::ShareOverflow {
                    process: process.to_string(),
                    period,
                    total,
                });
            }
        }
    }
    Ok(())
}
