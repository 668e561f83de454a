//! Checkpoint - Snapshots of solved scenarios
//!
//! A snapshot is the read-only hand-off to exporters: every flow with its
//! per-period value and provenance, every stock history, the indicators,
//! plus two hashes:
//!
//! - **input fingerprint**: SHA256 of the canonical JSON of the scenario input
//! - **results digest**: SHA256 over the bit patterns of every solved value
//!
//! Equal digests mean bit-identical results, which is how re-solves are
//! checked for idempotence.

use crate::indicators::Indicator;
use crate::lifetime::LifetimeDistribution;
use crate::models::flow::{Flow, FlowValue};
use crate::models::graph::MaterialGraph;
use crate::models::stock::{Cohort, Stock};
use crate::orchestrator::engine::{ScenarioData, SolveError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete solved scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSnapshot {
    pub scenario: String,

    /// Period labels
    pub periods: Vec<String>,

    pub flows: Vec<FlowSnapshot>,

    pub stocks: Vec<StockSnapshot>,

    pub indicators: Vec<Indicator>,

    /// SHA256 of the canonical scenario input
    pub input_fingerprint: String,

    /// SHA256 over every solved value
    pub results_digest: String,
}

/// Flow values with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub id: String,
    pub origin: String,
    pub destination: String,
    pub values: Vec<FlowValue>,
}

impl From<&Flow> for FlowSnapshot {
    fn from(flow: &Flow) -> Self {
        Self {
            id: flow.id().to_string(),
            origin: flow.origin().to_string(),
            destination: flow.destination().to_string(),
            values: flow.values().to_vec(),
        }
    }
}

/// Stock history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub process: String,
    pub lifetime: LifetimeDistribution,
    pub inflow: Vec<f64>,
    pub outflow: Vec<f64>,
    pub level: Vec<f64>,
    /// Live cohorts at the end of each period (empty when not recorded)
    pub cohorts: Vec<Vec<Cohort>>,
}

impl From<&Stock> for StockSnapshot {
    fn from(stock: &Stock) -> Self {
        let history = stock.history();
        Self {
            process: stock.process_id().to_string(),
            lifetime: stock.distribution().clone(),
            inflow: history.inflow.clone(),
            outflow: history.outflow.clone(),
            level: history.level.clone(),
            cohorts: history.cohorts.clone(),
        }
    }
}

impl ScenarioSnapshot {
    /// Capture a solved scenario
    pub fn capture(data: &ScenarioData) -> Self {
        let graph = data.graph();
        Self {
            scenario: data.name().to_string(),
            periods: graph.horizon().labels().to_vec(),
            flows: graph.flows().values().map(FlowSnapshot::from).collect(),
            stocks: graph.stocks().values().map(StockSnapshot::from).collect(),
            indicators: data.indicators().to_vec(),
            input_fingerprint: data.fingerprint().to_string(),
            results_digest: data.digest().to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, SolveError> {
        serde_json::to_string(self)
            .map_err(|e| SolveError::Serialization(format!("Snapshot serialization failed: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self, SolveError> {
        serde_json::from_str(json)
            .map_err(|e| SolveError::Serialization(format!("Snapshot deserialization failed: {}", e)))
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of any serializable input
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on map iteration order.
pub fn compute_fingerprint<T: Serialize>(input: &T) -> Result<String, SolveError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(input)
        .map_err(|e| SolveError::Serialization(format!("Input serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| SolveError::Serialization(format!("Input serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA256 over the bit patterns of all solved values
///
/// Covers flow values with their provenance, stock histories and indicator
/// series, each in ID order.
pub fn results_digest(graph: &MaterialGraph, indicators: &[Indicator]) -> String {
    let mut hasher = Sha256::new();

    for (id, flow) in graph.flows() {
        hasher.update(id.as_bytes());
        for value in flow.values() {
            let (tag, bits) = match value {
                FlowValue::Unknown => (0u8, 0u64),
                FlowValue::Given(v) => (1, v.to_bits()),
                FlowValue::Computed(v) => (2, v.to_bits()),
            };
            hasher.update([tag]);
            hasher.update(bits.to_le_bytes());
        }
    }

    for (id, stock) in graph.stocks() {
        hasher.update(id.as_bytes());
        let history = stock.history();
        for series in [&history.inflow, &history.outflow, &history.level] {
            for v in series {
                hasher.update(v.to_bits().to_le_bytes());
            }
        }
    }

    for indicator in indicators {
        hasher.update(indicator.id().as_bytes());
        for v in indicator.values() {
            hasher.update(v.to_bits().to_le_bytes());
        }
    }

    format!("{:x}", hasher.finalize())
}

// ============================================================================
// Validation
// ============================================================================

/// Integrity violations found in a snapshot
#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("Flow '{flow}' has no value for period {period}")]
    Unresolved { flow: String, period: usize },

    #[error("Stock at '{process}' violates conservation in period {period} by {residual}")]
    StockImbalance {
        process: String,
        period: usize,
        residual: f64,
    },

    #[error("Stock at '{process}' has {actual} cohort mass in period {period}, level is {level}")]
    CohortMismatch {
        process: String,
        period: usize,
        level: f64,
        actual: f64,
    },
}

/// Validate snapshot integrity
///
/// Checks critical invariants:
/// - Every flow resolved in every period
/// - Stock conservation: `level[t] = level[t-1] + inflow[t] - outflow[t]`
/// - Recorded cohorts sum to the level
pub fn validate_snapshot(snapshot: &ScenarioSnapshot, tolerance: f64) -> Result<(), SnapshotError> {
    for flow in &snapshot.flows {
        if let Some(period) = flow.values.iter().position(|v| !v.is_known()) {
            return Err(SnapshotError::Unresolved {
                flow: flow.id.clone(),
                period,
            });
        }
    }

    for stock in &snapshot.stocks {
        let mut previous = 0.0;
        for (period, &level) in stock.level.iter().enumerate() {
            let inflow = stock.inflow.get(period).copied().unwrap_or(0.0);
            let outflow = stock.outflow.get(period).copied().unwrap_or(0.0);
            let residual = previous + inflow - outflow - level;
            if residual.abs() > tolerance {
                return Err(SnapshotError::StockImbalance {
                    process: stock.process.clone(),
                    period,
                    residual,
                });
            }
            previous = level;
        }

        for (period, cohorts) in stock.cohorts.iter().enumerate() {
            let level = stock.level.get(period).copied().unwrap_or(0.0);
            let actual: f64 = cohorts.iter().map(|c| c.remaining).sum();
            if (actual - level).abs() > tolerance {
                return Err(SnapshotError::CohortMismatch {
                    process: stock.process.clone(),
                    period,
                    level,
                    actual,
                });
            }
        }
    }

    Ok(())
}
