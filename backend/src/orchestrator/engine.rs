//! Orchestrator Engine
//!
//! Solves one scenario over its whole horizon:
//!
//! ```text
//! build and validate the material graph
//! for each period t, strictly increasing:
//!     propagate balances (advancing stocks as their inflows resolve)
//! aggregate indicators
//! hash inputs and results
//! ```
//!
//! Stock cohorts depend on every earlier period, so periods can never be
//! solved out of order. A scenario owns its graph and stock state; the only
//! thing shared between solves is the read-mostly survival cache.
//!
//! # Example
//!
//! ```rust
//! use mfa_core_rs::orchestrator::{ScenarioSolver, SolverConfig};
//! use mfa_core_rs::{FlowSpec, FlowValue, Horizon, ScenarioInput};
//!
//! let input = ScenarioInput::new("baseline", Horizon::with_periods(3))
//!     .process("A", "Source")
//!     .process("B", "Transfer")
//!     .process("C", "Sink")
//!     .flow(FlowSpec::absolute("A", "B", vec![Some(10.0), Some(12.0), Some(8.0)]))
//!     .flow(FlowSpec::absolute("B", "C", vec![None, None, None]));
//!
//! let solver = ScenarioSolver::new(SolverConfig::default()).unwrap();
//! let data = solver.solve(&input).unwrap();
//!
//! let out = data.graph().get_flow("B->C").unwrap();
//! assert_eq!(out.values(), &[
//!     FlowValue::Computed(10.0),
//!     FlowValue::Computed(12.0),
//!     FlowValue::Computed(8.0),
//! ]);
//! ```

use crate::balance::{BalanceError, Incidence, PeriodReport, Propagator, PropagatorConfig, ScanOrder};
use crate::dynamics::{StockEngine, StockError, DEFAULT_NEGLIGIBLE_MASS};
use crate::indicators::{Indicator, IndicatorError};
use crate::lifetime::SurvivalCache;
use crate::models::event::EventLog;
use crate::models::flow::FlowError;
use crate::models::graph::{MaterialGraph, ModelError};
use crate::models::scenario::ScenarioInput;
use crate::orchestrator::checkpoint::{compute_fingerprint, results_digest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

// ============================================================================
// Configuration Types
// ============================================================================

/// Numeric settings shared by every scenario of a run
///
/// Lifetime distributions are configured per stock in the scenario input,
/// never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Absolute tolerance for balance checks
    pub tolerance: f64,

    /// Relaxation passes allowed per period before giving up
    pub max_passes: usize,

    /// Cohorts at or below this mass are retired
    pub negligible_mass: f64,

    /// Process visiting order within a pass
    pub scan_order: ScanOrder,

    /// Keep per-period cohort snapshots on stocks
    pub record_cohorts: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_passes: 10_000,
            negligible_mass: DEFAULT_NEGLIGIBLE_MASS,
            scan_order: ScanOrder::Sorted,
            record_cohorts: true,
        }
    }
}

/// Invalid configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tolerance must be finite and > 0, got {0}")]
    InvalidTolerance(f64),

    #[error("max_passes must be > 0")]
    ZeroMaxPasses,

    #[error("negligible_mass must be finite and >= 0, got {0}")]
    InvalidNegligibleMass(f64),

    #[error("Duplicate scenario name: {0}")]
    DuplicateScenario(String),
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ConfigError::InvalidTolerance(self.tolerance));
        }
        if self.max_passes == 0 {
            return Err(ConfigError::ZeroMaxPasses);
        }
        if !self.negligible_mass.is_finite() || self.negligible_mass < 0.0 {
            return Err(ConfigError::InvalidNegligibleMass(self.negligible_mass));
        }
        Ok(())
    }

    fn propagator_config(&self) -> PropagatorConfig {
        PropagatorConfig {
            tolerance: self.tolerance,
            max_passes: self.max_passes,
            scan_order: self.scan_order,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Classification of a scenario failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ReferentialIntegrity,
    InvalidInput,
    InvalidFlowValue,
    Underdetermined,
    OverdeterminedConflict,
    NonConvergent,
    Cancelled,
}

/// Why a scenario could not be solved
#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    #[error("Invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Balance error: {0}")]
    Balance(#[from] BalanceError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cancelled before solving started")]
    Cancelled,
}

impl SolveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SolveError::Model(
                ModelError::ReferentialIntegrity { .. } | ModelError::UnknownIndicatorReference { .. },
            ) => FailureKind::ReferentialIntegrity,
            SolveError::Model(ModelError::Flow(FlowError::InvalidValue { .. })) => {
                FailureKind::InvalidFlowValue
            }
            SolveError::Balance(BalanceError::Underdetermined { .. }) => FailureKind::Underdetermined,
            SolveError::Balance(BalanceError::OverdeterminedConflict { .. }) => {
                FailureKind::OverdeterminedConflict
            }
            SolveError::Balance(BalanceError::NonConvergent { .. }) => FailureKind::NonConvergent,
            SolveError::Balance(
                BalanceError::InvalidFlowValue { .. }
                | BalanceError::Stock(StockError::InvalidFlowValue { .. }),
            ) => FailureKind::InvalidFlowValue,
            SolveError::Cancelled => FailureKind::Cancelled,
            _ => FailureKind::InvalidInput,
        }
    }

    /// Period the failure occurred in, if it is tied to one
    pub fn period(&self) -> Option<usize> {
        match self {
            SolveError::Balance(e) => e.period(),
            SolveError::Indicator(IndicatorError::Unresolved { period, .. }) => Some(*period),
            SolveError::Model(ModelError::Flow(FlowError::InvalidValue { period, .. })) => {
                Some(*period)
            }
            _ => None,
        }
    }

    /// Process IDs named by the failure
    pub fn processes(&self) -> Vec<String> {
        match self {
            SolveError::Balance(e) => e.processes(),
            SolveError::Model(ModelError::ReferentialIntegrity { missing, .. }) => {
                vec![missing.clone()]
            }
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// Solved scenario
// ============================================================================

/// A fully solved scenario
///
/// Every flow has a value in every period, every stock has been advanced
/// through the whole horizon, and the indicators are final.
#[derive(Debug, Clone)]
pub struct ScenarioData {
    name: String,
    graph: MaterialGraph,
    indicators: Vec<Indicator>,
    events: EventLog,
    reports: Vec<PeriodReport>,
    fingerprint: String,
    digest: String,
}

impl ScenarioData {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &MaterialGraph {
        &self.graph
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    pub fn indicator(&self, id: &str) -> Option<&Indicator> {
        self.indicators.iter().find(|i| i.id() == id)
    }

    /// Events recorded while solving
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Per-period solve statistics
    pub fn reports(&self) -> &[PeriodReport] {
        &self.reports
    }

    /// SHA256 of the canonical scenario input
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// SHA256 over every solved value
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Solves scenarios one at a time
///
/// Cheap to share across threads: the only state is the configuration and
/// the survival cache.
#[derive(Debug, Clone)]
pub struct ScenarioSolver {
    config: SolverConfig,
    cache: Arc<SurvivalCache>,
}

impl ScenarioSolver {
    /// Create a solver with a fresh survival cache
    ///
    /// # Errors
    /// `ConfigError` if the configuration is out of range
    pub fn new(config: SolverConfig) -> Result<Self, ConfigError> {
        Self::with_cache(config, Arc::new(SurvivalCache::new()))
    }

    /// Create a solver sharing an existing survival cache
    pub fn with_cache(config: SolverConfig, cache: Arc<SurvivalCache>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SurvivalCache> {
        &self.cache
    }

    /// Solve one scenario over its whole horizon
    ///
    /// The input is never modified; solving the same input twice yields
    /// bit-identical results.
    #[instrument(skip(self, input), fields(scenario = %input.name))]
    pub fn solve(&self, input: &ScenarioInput) -> Result<ScenarioData, SolveError> {
        let fingerprint = compute_fingerprint(input)?;
        let mut graph = MaterialGraph::build(input, &self.cache, self.config.record_cohorts)?;
        let incidence = Incidence::from_graph(&graph);
        let propagator = Propagator::new(
            &incidence,
            StockEngine::new(self.config.negligible_mass),
            self.config.propagator_config(),
        );

        info!(
            processes = graph.num_processes(),
            flows = graph.num_flows(),
            periods = graph.periods(),
            "solving scenario"
        );

        let mut events = EventLog::new();
        let mut reports = Vec::with_capacity(graph.periods());
        for t in graph.horizon().cursor() {
            let report = propagator.solve_period(&mut graph, t, &mut events)?;
            debug!(
                period = t,
                label = graph.horizon().label(t).unwrap_or_default(),
                passes = report.passes,
                "period done"
            );
            reports.push(report);
        }

        let indicators = graph
            .indicator_specs()
            .iter()
            .map(|spec| Indicator::compute(spec, &graph))
            .collect::<Result<Vec<_>, _>>()?;

        let digest = results_digest(&graph, &indicators);
        let (given, computed, _) = graph.provenance_counts();
        info!(given, computed, digest = %digest, "scenario solved");

        Ok(ScenarioData {
            name: input.name.clone(),
            graph,
            indicators,
            events,
            reports,
            fingerprint,
            digest,
        })
    }
}
