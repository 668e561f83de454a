//! Batch runs over many scenarios
//!
//! Scenarios share nothing mutable, so a batch fans them out over a worker
//! pool and joins once at the end. A failing scenario never aborts the
//! batch: each one ends up `Solved` or `Failed`, keyed by name.
//!
//! Cancellation is cooperative and checked before each scenario starts;
//! scenarios already running finish normally.

use crate::models::scenario::ScenarioInput;
use crate::orchestrator::engine::{ConfigError, FailureKind, ScenarioData, ScenarioSolver, SolveError, SolverConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub solver: SolverConfig,

    /// Solve scenarios one after another even when parallelism is available
    #[serde(default)]
    pub force_sequential: bool,
}

/// Shared flag for stopping a batch between scenarios
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear the flag so the next run starts normally
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Diagnostic record of one failed scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub scenario: String,
    pub kind: FailureKind,
    pub period: Option<usize>,
    pub processes: Vec<String>,
    pub message: String,
}

impl FailureReport {
    pub fn from_error(scenario: &str, error: &SolveError) -> Self {
        Self {
            scenario: scenario.to_string(),
            kind: error.kind(),
            period: error.period(),
            processes: error.processes(),
            message: error.to_string(),
        }
    }
}

/// Result of one scenario in a batch
#[derive(Debug, Clone)]
pub enum ScenarioOutcome {
    Solved(Box<ScenarioData>),
    Failed(FailureReport),
}

impl ScenarioOutcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, ScenarioOutcome::Solved(_))
    }

    pub fn data(&self) -> Option<&ScenarioData> {
        match self {
            ScenarioOutcome::Solved(data) => Some(data.as_ref()),
            ScenarioOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        match self {
            ScenarioOutcome::Solved(_) => None,
            ScenarioOutcome::Failed(report) => Some(report),
        }
    }
}

/// Serializable overview of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub solved: Vec<String>,
    pub failures: Vec<FailureReport>,
}

/// Outcomes of a batch, keyed by scenario name
#[derive(Debug, Clone)]
pub struct BatchReport {
    run_id: Uuid,
    outcomes: BTreeMap<String, ScenarioOutcome>,
}

impl BatchReport {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn outcomes(&self) -> &BTreeMap<String, ScenarioOutcome> {
        &self.outcomes
    }

    pub fn get(&self, scenario: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.get(scenario)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn solved_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_solved()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailureReport> {
        self.outcomes.values().filter_map(ScenarioOutcome::failure)
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            run_id: self.run_id,
            solved: self
                .outcomes
                .iter()
                .filter(|(_, o)| o.is_solved())
                .map(|(name, _)| name.clone())
                .collect(),
            failures: self.failures().cloned().collect(),
        }
    }
}

/// Solves independent scenarios, in parallel when enabled
///
/// # Example
///
/// ```rust
/// use mfa_core_rs::orchestrator::{BatchConfig, BatchRunner, FailureKind};
/// use mfa_core_rs::{FlowSpec, Horizon, ScenarioInput};
///
/// let good = ScenarioInput::new("good", Horizon::with_periods(1))
///     .process("A", "a")
///     .process("B", "b")
///     .process("C", "c")
///     .flow(FlowSpec::absolute("A", "B", vec![Some(1.0)]))
///     .flow(FlowSpec::absolute("B", "C", vec![None]));
/// let bad = ScenarioInput::new("bad", Horizon::with_periods(1))
///     .process("A", "a")
///     .process("B", "b")
///     .flow(FlowSpec::absolute("A", "B", vec![None]));
///
/// let runner = BatchRunner::new(BatchConfig::default()).unwrap();
/// let report = runner.run(&[good, bad]).unwrap();
///
/// let summary = report.summary();
/// assert_eq!(summary.solved, vec!["good".to_string()]);
/// assert_eq!(summary.failures[0].kind, FailureKind::Underdetermined);
/// ```
#[derive(Debug, Clone)]
pub struct BatchRunner {
    config: BatchConfig,
    solver: ScenarioSolver,
    cancel: CancelToken,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Result<Self, ConfigError> {
        let solver = ScenarioSolver::new(config.solver.clone())?;
        Ok(Self {
            config,
            solver,
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn solver(&self) -> &ScenarioSolver {
        &self.solver
    }

    /// Handle for cancelling runs from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Solve every scenario and collect per-scenario outcomes
    ///
    /// # Errors
    /// `ConfigError::DuplicateScenario` if two scenarios share a name
    pub fn run(&self, scenarios: &[ScenarioInput]) -> Result<BatchReport, ConfigError> {
        let mut names = BTreeSet::new();
        for scenario in scenarios {
            if !names.insert(scenario.name.as_str()) {
                return Err(ConfigError::DuplicateScenario(scenario.name.clone()));
            }
        }

        let run_id = Uuid::new_v4();
        info!(%run_id, scenarios = scenarios.len(), "batch started");

        let outcomes: BTreeMap<String, ScenarioOutcome> =
            map_scenarios(scenarios, |s| (s.name.clone(), self.run_one(s)), self.config.force_sequential)
                .into_iter()
                .collect();

        let report = BatchReport { run_id, outcomes };
        info!(
            %run_id,
            solved = report.solved_count(),
            failed = report.len() - report.solved_count(),
            "batch finished"
        );
        Ok(report)
    }

    fn run_one(&self, scenario: &ScenarioInput) -> ScenarioOutcome {
        let result = if self.cancel.is_cancelled() {
            Err(SolveError::Cancelled)
        } else {
            self.solver.solve(scenario)
        };

        match result {
            Ok(data) => ScenarioOutcome::Solved(Box::new(data)),
            Err(error) => {
                warn!(scenario = %scenario.name, kind = ?error.kind(), %error, "scenario failed");
                ScenarioOutcome::Failed(FailureReport::from_error(&scenario.name, &error))
            }
        }
    }
}

fn map_scenarios<F, R>(scenarios: &[ScenarioInput], f: F, force_sequential: bool) -> Vec<R>
where
    F: Fn(&ScenarioInput) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            scenarios.iter().map(f).collect()
        } else {
            scenarios.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        scenarios.iter().map(f).collect()
    }
}
