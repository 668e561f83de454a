//! Event logging for solve diagnostics.
//!
//! Every scenario solve records the steps that produced its values:
//! - Which flow was resolved, at which process, in which pass
//! - Each stock advance with its inflow, outflow and level
//! - Pass and period completion
//! - Balance violations found while checking a period
//!
//! Events are appended in the order they happen, so the log replays how a
//! period was solved.
//!
//! # Example
//!
//! ```rust
//! use mfa_core_rs::models::{EventLog, SolveEvent};
//!
//! let mut log = EventLog::new();
//! log.log(SolveEvent::PeriodSolved { period: 0, passes: 2 });
//! assert_eq!(log.events_in_period(0).len(), 1);
//! ```

use serde::{Deserialize, Serialize};

/// How a flow value was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Remainder of a process balance
    Balance,
    /// Share of the origin's total outflow
    Share,
}

/// Solver event capturing a state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SolveEvent {
    /// A previously unknown flow value was computed
    FlowResolved {
        period: usize,
        pass: usize,
        flow_id: String,
        process_id: String,
        value: f64,
        derivation: Derivation,
    },

    /// A stock was advanced by one period
    StockAdvanced {
        period: usize,
        process_id: String,
        inflow: f64,
        outflow: f64,
        level: f64,
        live_cohorts: usize,
    },

    /// A relaxation pass finished
    PassCompleted {
        period: usize,
        pass: usize,
        resolved: usize,
    },

    /// All flows of a period are known and balanced
    PeriodSolved { period: usize, passes: usize },

    /// A fully known process does not balance
    BalanceViolation {
        period: usize,
        process_id: String,
        imbalance: f64,
    },
}

impl SolveEvent {
    /// Period the event belongs to
    pub fn period(&self) -> usize {
        match self {
            SolveEvent::FlowResolved { period, .. } => *period,
            SolveEvent::StockAdvanced { period, .. } => *period,
            SolveEvent::PassCompleted { period, .. } => *period,
            SolveEvent::PeriodSolved { period, .. } => *period,
            SolveEvent::BalanceViolation { period, .. } => *period,
        }
    }

    /// Short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            SolveEvent::FlowResolved { .. } => "flow_resolved",
            SolveEvent::StockAdvanced { .. } => "stock_advanced",
            SolveEvent::PassCompleted { .. } => "pass_completed",
            SolveEvent::PeriodSolved { .. } => "period_solved",
            SolveEvent::BalanceViolation { .. } => "balance_violation",
        }
    }

    /// Process involved, if any
    pub fn process_id(&self) -> Option<&str> {
        match self {
            SolveEvent::FlowResolved { process_id, .. }
            | SolveEvent::StockAdvanced { process_id, .. }
            | SolveEvent::BalanceViolation { process_id, .. } => Some(process_id),
            _ => None,
        }
    }

    /// Flow involved, if any
    pub fn flow_id(&self) -> Option<&str> {
        match self {
            SolveEvent::FlowResolved { flow_id, .. } => Some(flow_id),
            _ => None,
        }
    }
}

/// Append-only list of solve events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SolveEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Add an event to the log
    pub fn log(&mut self, event: SolveEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[SolveEvent] {
        &self.events
    }

    /// Events of one period
    pub fn events_in_period(&self, period: usize) -> Vec<&SolveEvent> {
        self.events.iter().filter(|e| e.period() == period).collect()
    }

    /// Events of a specific type
    pub fn events_of_type(&self, event_type: &str) -> Vec<&SolveEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Events for a specific flow
    pub fn events_for_flow(&self, flow_id: &str) -> Vec<&SolveEvent> {
        self.events
            .iter()
            .filter(|e| e.flow_id() == Some(flow_id))
            .collect()
    }

    /// Events for a specific process
    pub fn events_for_process(&self, process_id: &str) -> Vec<&SolveEvent> {
        self.events
            .iter()
            .filter(|e| e.process_id() == Some(process_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters() {
        let mut log = EventLog::new();
        log.log(SolveEvent::FlowResolved {
            period: 1,
            pass: 1,
            flow_id: "B->C".to_string(),
            process_id: "B".to_string(),
            value: 12.0,
            derivation: Derivation::Balance,
        });
        log.log(SolveEvent::PeriodSolved { period: 1, passes: 1 });

        assert_eq!(log.len(), 2);
        assert_eq!(log.events_of_type("flow_resolved").len(), 1);
        assert_eq!(log.events_for_flow("B->C").len(), 1);
        assert_eq!(log.events_for_process("B").len(), 1);
        assert_eq!(log.events_in_period(0).len(), 0);
    }
}
