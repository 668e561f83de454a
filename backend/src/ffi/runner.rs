//! PyO3 wrapper for the batch runner

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::scenario::ScenarioInput;
use crate::orchestrator::{BatchConfig, BatchRunner, BatchSummary, ScenarioSnapshot};

/// Python wrapper for the Rust batch runner
///
/// # Example (from Python)
///
/// ```python
/// from mfa_core_rs import BatchRunner
///
/// runner = BatchRunner('{"solver": {"tolerance": 1e-6}}')
/// snapshot = json.loads(runner.solve(json.dumps(scenario)))
/// print(snapshot["results_digest"])
/// ```
#[pyclass(name = "BatchRunner")]
pub struct PyBatchRunner {
    inner: BatchRunner,
}

#[derive(Serialize)]
struct BatchResult {
    summary: BatchSummary,
    snapshots: BTreeMap<String, ScenarioSnapshot>,
}

fn value_error(context: &str, e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyValueError, _>(format!("{}: {}", context, e))
}

fn runtime_error(context: &str, e: impl std::fmt::Display) -> PyErr {
    PyErr::new::<PyRuntimeError, _>(format!("{}: {}", context, e))
}

#[pymethods]
impl PyBatchRunner {
    /// Create a runner from an optional JSON batch configuration
    ///
    /// # Errors
    ///
    /// Raises ValueError if the JSON is malformed or values are out of range
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config: BatchConfig = match config_json {
            Some(json) => serde_json::from_str(json).map_err(|e| value_error("Invalid config", e))?,
            None => BatchConfig::default(),
        };
        let inner = BatchRunner::new(config).map_err(|e| value_error("Invalid config", e))?;
        Ok(PyBatchRunner { inner })
    }

    /// Solve one scenario and return its snapshot as JSON
    ///
    /// Raises RuntimeError if the scenario cannot be solved.
    fn solve(&self, py: Python<'_>, scenario_json: &str) -> PyResult<String> {
        let input: ScenarioInput =
            serde_json::from_str(scenario_json).map_err(|e| value_error("Invalid scenario", e))?;
        let solver = self.inner.solver();

        let data = py
            .allow_threads(|| solver.solve(&input))
            .map_err(|e| runtime_error("Solve failed", e))?;

        ScenarioSnapshot::capture(&data)
            .to_json()
            .map_err(|e| runtime_error("Export failed", e))
    }

    /// Solve a JSON list of scenarios
    ///
    /// Returns JSON `{"summary": ..., "snapshots": {name: snapshot}}`.
    /// Failed scenarios appear only in the summary.
    fn run(&self, py: Python<'_>, scenarios_json: &str) -> PyResult<String> {
        let inputs: Vec<ScenarioInput> =
            serde_json::from_str(scenarios_json).map_err(|e| value_error("Invalid scenarios", e))?;
        let runner = &self.inner;

        let report = py
            .allow_threads(|| runner.run(&inputs))
            .map_err(|e| value_error("Invalid batch", e))?;

        let snapshots = report
            .outcomes()
            .iter()
            .filter_map(|(name, outcome)| {
                outcome
                    .data()
                    .map(|data| (name.clone(), ScenarioSnapshot::capture(data)))
            })
            .collect();

        let result = BatchResult {
            summary: report.summary(),
            snapshots,
        };
        serde_json::to_string(&result).map_err(|e| runtime_error("Export failed", e))
    }

    /// Stop before the next scenario starts
    fn cancel(&self) {
        self.inner.cancel_token().cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancel_token().is_cancelled()
    }
}
