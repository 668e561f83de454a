//! Orchestrator - drives scenarios through their horizon
//!
//! - `engine`: single-scenario solver and its configuration
//! - `batch`: multi-scenario runs with per-scenario outcomes
//! - `checkpoint`: snapshots, fingerprints and result digests

pub mod batch;
pub mod checkpoint;
pub mod engine;

pub use batch::{
    BatchConfig, BatchReport, BatchRunner, BatchSummary, CancelToken, FailureReport, ScenarioOutcome,
};
pub use checkpoint::{
    compute_fingerprint, results_digest, validate_snapshot, FlowSnapshot, ScenarioSnapshot,
    SnapshotError, StockSnapshot,
};
pub use engine::{ConfigError, FailureKind, ScenarioData, ScenarioSolver, SolveError, SolverConfig};
