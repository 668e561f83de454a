//! Process incidence index
//!
//! For every process, the flows entering and leaving it. Built once per
//! scenario; the propagator consults it on every pass instead of scanning
//! all flows.
//!
//! # Determinism
//!
//! - Processes are indexed in lexicographic order of their IDs
//! - Incident flow lists are sorted by flow ID
//! - Scan orders are derived from these indices (sorted, reversed or a
//!   seeded shuffle)

use crate::models::graph::MaterialGraph;
use crate::rng::ScanRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order in which the propagator visits processes within a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanOrder {
    /// Lexicographic by process ID
    #[default]
    Sorted,
    /// Reverse lexicographic
    Reversed,
    /// Seeded permutation, different for every period
    Shuffled { seed: u64 },
}

/// Role of a process in the balance equations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Carries a stock; balance includes the stock's accumulation
    Stock,
    /// Ordinary process with inflows and outflows
    Internal,
    /// Source or sink without a balance equation
    Boundary,
}

/// Flows incident to each process
#[derive(Debug, Clone)]
pub struct Incidence {
    /// Process ID -> index (stable, sorted)
    process_to_index: BTreeMap<String, usize>,

    /// Index -> process ID
    index_to_process: Vec<String>,

    /// Incoming flow IDs per process index
    inflows: Vec<Vec<String>>,

    /// Outgoing flow IDs per process index
    outflows: Vec<Vec<String>>,

    /// Role per process index
    roles: Vec<ProcessRole>,
}

impl Incidence {
    /// Index the processes and flows of a graph
    pub fn from_graph(graph: &MaterialGraph) -> Self {
        let index_to_process: Vec<String> = graph.processes().keys().cloned().collect();
        let process_to_index: BTreeMap<String, usize> = index_to_process
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        let n = index_to_process.len();
        let mut inflows = vec![Vec::new(); n];
        let mut outflows = vec![Vec::new(); n];

        // flows() iterates in flow ID order, so the lists come out sorted
        for (flow_id, flow) in graph.flows() {
            if let Some(&idx) = process_to_index.get(flow.destination()) {
                inflows[idx].push(flow_id.clone());
            }
            if let Some(&idx) = process_to_index.get(flow.origin()) {
                outflows[idx].push(flow_id.clone());
            }
        }

        let roles = index_to_process
            .iter()
            .enumerate()
            .map(|(idx, id)| {
                let has_stock = graph.get_process(id).map_or(false, |p| p.has_stock());
                if has_stock {
                    ProcessRole::Stock
                } else if inflows[idx].is_empty() || outflows[idx].is_empty() {
                    ProcessRole::Boundary
                } else {
                    ProcessRole::Internal
                }
            })
            .collect();

        Self {
            process_to_index,
            index_to_process,
            inflows,
            outflows,
            roles,
        }
    }

    pub fn process_count(&self) -> usize {
        self.index_to_process.len()
    }

    pub fn process_id(&self, idx: usize) -> &str {
        &self.index_to_process[idx]
    }

    pub fn index_of(&self, process_id: &str) -> Option<usize> {
        self.process_to_index.get(process_id).copied()
    }

    pub fn inflows(&self, idx: usize) -> &[String] {
        &self.inflows[idx]
    }

    pub fn outflows(&self, idx: usize) -> &[String] {
        &self.outflows[idx]
    }

    pub fn role(&self, idx: usize) -> ProcessRole {
        self.roles[idx]
    }

    /// Processes in the order a pass visits them in period `t`
    ///
    /// # Example
    /// ```
    /// use mfa_core_rs::balance::{Incidence, ScanOrder};
    /// use mfa_core_rs::{FlowSpec, Horizon, MaterialGraph, ScenarioInput, SurvivalCache};
    ///
    /// let input = ScenarioInput::new("s", Horizon::with_periods(1))
    ///     .process("A", "a")
    ///     .process("B", "b")
    ///     .process("C", "c")
    ///     .flow(FlowSpec::absolute("A", "B", vec![Some(1.0)]))
    ///     .flow(FlowSpec::absolute("B", "C", vec![None]));
    /// let graph = MaterialGraph::build(&input, &SurvivalCache::new(), false).unwrap();
    /// let incidence = Incidence::from_graph(&graph);
    ///
    /// assert_eq!(incidence.scan_order(ScanOrder::Sorted, 0), vec![0, 1, 2]);
    /// assert_eq!(incidence.scan_order(ScanOrder::Reversed, 0), vec![2, 1, 0]);
    /// ```
    pub fn scan_order(&self, order: ScanOrder, t: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.process_count()).collect();
        match order {
            ScanOrder::Sorted => {}
            ScanOrder::Reversed => indices.reverse(),
            ScanOrder::Shuffled { seed } => ScanRng::for_period(seed, t).shuffle(&mut indices),
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::Horizon;
    use crate::lifetime::{LifetimeDistribution, SurvivalCache};
    use crate::models::scenario::{FlowSpec, ScenarioInput};

    fn graph() -> MaterialGraph {
        let input = ScenarioInput::new("s", Horizon::with_periods(1))
            .process("mine", "Mining")
            .process("fab", "Fabrication")
            .stock_process("use", "Use", LifetimeDistribution::Fixed { lifetime: 3.0 })
            .process("waste", "Waste")
            .flow(FlowSpec::absolute("mine", "fab", vec![Some(5.0)]))
            .flow(FlowSpec::absolute("fab", "use", vec![None]))
            .flow(FlowSpec::absolute("use", "waste", vec![None]))
            .flow(FlowSpec::absolute("waste", "fab", vec![None]));
        MaterialGraph::build(&input, &SurvivalCache::new(), false).unwrap()
    }

    #[test]
    fn test_roles() {
        let graph = graph();
        let incidence = Incidence::from_graph(&graph);
        let role = |id: &str| incidence.role(incidence.index_of(id).unwrap());

        assert_eq!(role("mine"), ProcessRole::Boundary);
        assert_eq!(role("fab"), ProcessRole::Internal);
        assert_eq!(role("use"), ProcessRole::Stock);
        assert_eq!(role("waste"), ProcessRole::Internal);
    }

    #[test]
    fn test_incident_flows_sorted() {
        let graph = graph();
        let incidence = Incidence::from_graph(&graph);
        let fab = incidence.index_of("fab").unwrap();
        assert_eq!(incidence.inflows(fab), &["mine->fab", "waste->fab"]);
        assert_eq!(incidence.outflows(fab), &["fab->use"]);
    }

    #[test]
    fn test_shuffled_order_is_permutation() {
        let graph = graph();
        let incidence = Incidence::from_graph(&graph);
        let mut order = incidence.scan_order(ScanOrder::Shuffled { seed: 3 }, 5);
        order.sort_unstable();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
