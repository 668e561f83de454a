//! MFA Core - Rust Engine
//!
//! Dynamic material flow analysis: resolves unknown flows of a process
//! network period by period from mass balance, with cohort-based stocks
//! releasing material according to lifetime distributions.
//!
//! # Architecture
//!
//! - **core**: Time horizon and period cursor
//! - **models**: Domain types (Process, Flow, Stock, MaterialGraph, events)
//! - **lifetime**: Lifetime distributions and the shared survival cache
//! - **dynamics**: Stock engine (cohort accumulation and outflow)
//! - **balance**: Incidence index and mass-balance propagator
//! - **indicators**: Aggregated read-only series
//! - **orchestrator**: Scenario solver, batch runner, snapshots
//! - **rng**: Deterministic scan-order shuffling
//!
//! # Critical Invariants
//!
//! 1. Every non-boundary process balances within tolerance in every period
//! 2. Stock level changes by exactly inflow minus outflow
//! 3. Periods are solved in strictly increasing order
//! 4. Results never depend on scan order or thread scheduling

pub mod balance;
pub mod core;
pub mod dynamics;
pub mod indicators;
pub mod lifetime;
pub mod models;
pub mod orchestrator;
pub mod rng;

// Re-exports for convenience
pub use balance::{BalanceError, ScanOrder};
pub use crate::core::time::{Horizon, PeriodCursor};
pub use dynamics::{StockEngine, StockError};
pub use indicators::{Indicator, IndicatorSource, IndicatorSpec};
pub use lifetime::{LifetimeDistribution, LifetimeError, SurvivalCache};
pub use models::{
    event::{EventLog, SolveEvent},
    flow::{Flow, FlowError, FlowValue},
    graph::{MaterialGraph, ModelError},
    process::Process,
    scenario::{FlowModifier, FlowSpec, ScenarioInput, ValueChange},
    stock::{Cohort, Stock},
};
pub use orchestrator::{
    BatchConfig, BatchReport, BatchRunner, FailureKind, ScenarioData, ScenarioOutcome,
    ScenarioSnapshot, ScenarioSolver, SolveError, SolverConfig,
};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn mfa_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::runner::PyBatchRunner>()?;
    Ok(())
}
