//! Mass-Balance Propagator
//!
//! Resolves unknown flow values of one period from the known ones. Every
//! non-boundary process obeys
//!
//! ```text
//! sum(inflows) = sum(outflows) + accumulation
//! ```
//!
//! where `accumulation` is zero for ordinary processes and
//! `inflow - outflow` of the stock for stock-bearing ones.
//!
//! # Algorithm
//!
//! Repeated relaxation over all processes, not a topological sort, so
//! recycling loops are handled without recursion:
//!
//! ```text
//! repeat (at most max_passes):
//!     for each unsettled process, in scan order:
//!         stock process with all inflows known -> advance the stock once;
//!             total outflow = stock outflow
//!         stock process with unknown inflows -> total outflow = previewed
//!             stock outflow (earlier cohorts only); the inflow stays open
//!         no unknown inflow  -> total outflow = known inflow
//!         one unknown inflow, no unknown absolute outflow
//!                            -> total outflow = known outflow / (1 - open shares)
//!         with total outflow known: relative outflows = share * total,
//!             a single unknown absolute outflow takes the remainder,
//!             a single unknown inflow takes total - known inflow
//!     stop when every process is settled; a pass without progress
//!     means the period is under-determined
//! ```
//!
//! Each unknown has exactly one algebraic solution, so the scan order can
//! change in which pass a value is found but never the value.

use crate::balance::incidence::{Incidence, ProcessRole, ScanOrder};
use crate::dynamics::{StockEngine, StockError};
use crate::models::event::{Derivation, EventLog, SolveEvent};
use crate::models::flow::FlowError;
use crate::models::graph::MaterialGraph;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that end the solve of one period
#[derive(Debug, Error, PartialEq)]
pub enum BalanceError {
    #[error("Under-determined system in period {period}: processes {processes:?} cannot resolve flows {flows:?}")]
    Underdetermined {
        period: usize,
        processes: Vec<String>,
        flows: Vec<String>,
    },

    #[error("Conflicting inputs in period {period}: processes {processes:?} are out of balance by up to {imbalance} (tolerance {tolerance})")]
    OverdeterminedConflict {
        period: usize,
        processes: Vec<String>,
        imbalance: f64,
        tolerance: f64,
    },

    #[error("No convergence in period {period} after {passes} passes")]
    NonConvergent { period: usize, passes: usize },

    #[error("Invalid value {value} computed for flow '{flow}' in period {period}")]
    InvalidFlowValue {
        period: usize,
        flow: String,
        value: f64,
    },

    #[error("Stock error: {0}")]
    Stock(#[from] StockError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

impl BalanceError {
    /// Period the error refers to
    pub fn period(&self) -> Option<usize> {
        match self {
            BalanceError::Underdetermined { period, .. }
            | BalanceError::OverdeterminedConflict { period, .. }
            | BalanceError::NonConvergent { period, .. }
            | BalanceError::InvalidFlowValue { period, .. } => Some(*period),
            BalanceError::Stock(StockError::InvalidFlowValue { period, .. }) => Some(*period),
            BalanceError::Stock(StockError::OutOfOrder { actual, .. }) => Some(*actual),
            BalanceError::Flow(
                FlowError::InvalidValue { period, .. }
                | FlowError::AlreadyResolved { period, .. }
                | FlowError::PeriodOutOfRange { period, .. },
            ) => Some(*period),
        }
    }

    /// Processes named by the error
    pub fn processes(&self) -> Vec<String> {
        match self {
            BalanceError::Underdetermined { processes, .. }
            | BalanceError::OverdeterminedConflict { processes, .. } => processes.clone(),
            BalanceError::Stock(
                StockError::InvalidFlowValue { process, .. } | StockError::OutOfOrder { process, .. },
            ) => vec![process.clone()],
            _ => Vec::new(),
        }
    }
}

/// Numeric settings of the propagator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PropagatorConfig {
    /// Absolute tolerance for balance checks and negative clamping
    pub tolerance: f64,
    /// Maximum relaxation passes per period
    pub max_passes: usize,
    /// Order of process visits within a pass
    pub scan_order: ScanOrder,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_passes: 10_000,
            scan_order: ScanOrder::Sorted,
        }
    }
}

/// Summary of one solved period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub period: usize,
    /// Relaxation passes used
    pub passes: usize,
    /// Flow values computed in this period
    pub resolved: usize,
}

/// Result of evaluating one process once
#[derive(Debug, Default)]
struct Evaluation {
    resolved: usize,
    advanced: bool,
    settled: bool,
}

/// Unknown and known terms around one process
struct Terms<'a> {
    known_in: f64,
    unknown_in: Vec<&'a str>,
    known_out: f64,
    unknown_out: Vec<&'a str>,
    open_shares: Vec<(&'a str, f64)>,
}

/// Solves flow values period by period
pub struct Propagator<'a> {
    incidence: &'a Incidence,
    engine: StockEngine,
    config: PropagatorConfig,
}

impl<'a> Propagator<'a> {
    pub fn new(incidence: &'a Incidence, engine: StockEngine, config: PropagatorConfig) -> Self {
        Self {
            incidence,
            engine,
            config,
        }
    }

    /// Resolve every flow of period `t`
    ///
    /// Stocks are advanced to `t` along the way. On error the period is
    /// left partially solved; the caller abandons the scenario.
    pub fn solve_period(
        &self,
        graph: &mut MaterialGraph,
        t: usize,
        log: &mut EventLog,
    ) -> Result<PeriodReport, BalanceError> {
        let order = self.incidence.scan_order(self.config.scan_order, t);
        let mut settled = vec![false; self.incidence.process_count()];
        let mut passes = 0;
        let mut resolved = 0;

        while settled.iter().any(|s| !s) {
            if passes >= self.config.max_passes {
                debug!(period = t, passes, "pass limit reached");
                return Err(BalanceError::NonConvergent { period: t, passes });
            }
            passes += 1;

            let mut progress = false;
            let mut resolved_in_pass = 0;
            for &idx in &order {
                if settled[idx] {
                    continue;
                }
                let eval = self.evaluate(graph, idx, t, passes, log)?;
                progress |= eval.resolved > 0 || eval.advanced || eval.settled;
                resolved_in_pass += eval.resolved;
                settled[idx] = eval.settled;
            }
            resolved += resolved_in_pass;

            trace!(period = t, pass = passes, resolved = resolved_in_pass, "pass complete");
            log.log(SolveEvent::PassCompleted {
                period: t,
                pass: passes,
                resolved: resolved_in_pass,
            });

            if !progress {
                self.check_conflicts(graph, t, log)?;
                return Err(self.underdetermined(graph, &settled, t));
            }
        }

        self.check_conflicts(graph, t, log)?;

        // Flows running straight from a source to a sink have no equation
        if graph.unknown_count(t) > 0 {
            return Err(self.underdetermined(graph, &settled, t));
        }

        debug!(period = t, passes, resolved, "period solved");
        log.log(SolveEvent::PeriodSolved { period: t, passes });
        Ok(PeriodReport {
            period: t,
            passes,
            resolved,
        })
    }

    fn evaluate(
        &self,
        graph: &mut MaterialGraph,
        idx: usize,
        t: usize,
        pass: usize,
        log: &mut EventLog,
    ) -> Result<Evaluation, BalanceError> {
        let role = self.incidence.role(idx);
        if role == ProcessRole::Boundary {
            return Ok(Evaluation {
                settled: true,
                ..Default::default()
            });
        }

        let process_id = self.incidence.process_id(idx);
        let terms = self.gather(graph, idx, t);
        let mut eval = Evaluation::default();

        let mut stock_pending = false;
        let total_out = match role {
            ProcessRole::Stock => {
                let Some(stock) = graph.get_stock(process_id) else {
                    return Ok(eval);
                };
                if stock.is_advanced(t) {
                    stock.outflow(t)
                } else if terms.unknown_in.is_empty() {
                    self.advance_stock(graph, process_id, terms.known_in, t, log)?;
                    eval.advanced = true;
                    graph.get_stock(process_id).and_then(|s| s.outflow(t))
                } else {
                    // Outflow comes from earlier cohorts only, so it can be
                    // released before the inflow is known
                    stock_pending = true;
                    if terms.unknown_out.is_empty() && terms.open_shares.is_empty() {
                        return Ok(eval);
                    }
                    Some(self.engine.preview_outflow(stock, t)?)
                }
            }
            _ => {
                let open: f64 = terms.open_shares.iter().map(|(_, share)| share).sum();
                match (terms.unknown_in.len(), terms.unknown_out.len()) {
                    (0, _) => Some(terms.known_in),
                    (1, 0) if terms.open_shares.is_empty() => Some(terms.known_out),
                    (1, 0) if 1.0 - open > self.config.tolerance => {
                        Some(terms.known_out / (1.0 - open))
                    }
                    _ => None,
                }
            }
        };

        let Some(total_out) = total_out else {
            return Ok(eval);
        };

        let mut share_sum = 0.0;
        for &(flow_id, share) in &terms.open_shares {
            share_sum += self.write(graph, flow_id, process_id, share * total_out, t, pass, Derivation::Share, log)?;
            eval.resolved += 1;
        }

        let mut remaining = terms.unknown_in.len() + terms.unknown_out.len();
        if let [flow_id] = terms.unknown_out.as_slice() {
            let value = total_out - terms.known_out - share_sum;
            self.write(graph, flow_id, process_id, value, t, pass, Derivation::Balance, log)?;
            eval.resolved += 1;
            remaining -= 1;
        }
        if let [flow_id] = terms.unknown_in.as_slice() {
            if role == ProcessRole::Internal && terms.unknown_out.is_empty() {
                let value = total_out - terms.known_in;
                self.write(graph, flow_id, process_id, value, t, pass, Derivation::Balance, log)?;
                eval.resolved += 1;
                remaining -= 1;
            }
        }

        eval.settled = remaining == 0 && !stock_pending;
        Ok(eval)
    }

    /// Sum known incident values and list the unknown ones
    fn gather(&self, graph: &MaterialGraph, idx: usize, t: usize) -> Terms<'a> {
        let incidence: &'a Incidence = self.incidence;
        let mut terms = Terms {
            known_in: 0.0,
            unknown_in: Vec::new(),
            known_out: 0.0,
            unknown_out: Vec::new(),
            open_shares: Vec::new(),
        };

        for flow_id in incidence.inflows(idx) {
            match graph.get_flow(flow_id).and_then(|f| f.value(t).value()) {
                Some(v) => terms.known_in += v,
                None => terms.unknown_in.push(flow_id),
            }
        }
        for flow_id in incidence.outflows(idx) {
            let Some(flow) = graph.get_flow(flow_id) else {
                continue;
            };
            match (flow.value(t).value(), flow.share(t)) {
                (Some(v), _) => terms.known_out += v,
                (None, Some(share)) => terms.open_shares.push((flow_id, share)),
                (None, None) => terms.unknown_out.push(flow_id),
            }
        }
        terms
    }

    fn advance_stock(
        &self,
        graph: &mut MaterialGraph,
        process_id: &str,
        inflow: f64,
        t: usize,
        log: &mut EventLog,
    ) -> Result<(), BalanceError> {
        let Some(stock) = graph.get_stock_mut(process_id) else {
            return Ok(());
        };
        let step = self.engine.advance(stock, inflow, t)?;
        log.log(SolveEvent::StockAdvanced {
            period: t,
            process_id: process_id.to_string(),
            inflow: step.inflow,
            outflow: step.outflow,
            level: step.level,
            live_cohorts: stock.cohorts().live(),
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        graph: &mut MaterialGraph,
        flow_id: &str,
        process_id: &str,
        value: f64,
        t: usize,
        pass: usize,
        derivation: Derivation,
        log: &mut EventLog,
    ) -> Result<f64, BalanceError> {
        let Some(flow) = graph.get_flow_mut(flow_id) else {
            return Ok(0.0);
        };
        let stored = flow
            .set_computed(t, value, self.config.tolerance)
            .map_err(|e| match e {
                FlowError::InvalidValue { flow, period, value } => {
                    BalanceError::InvalidFlowValue { period, flow, value }
                }
                other => BalanceError::Flow(other),
            })?;

        trace!(period = t, pass, flow = flow_id, process = process_id, value = stored, "flow resolved");
        log.log(SolveEvent::FlowResolved {
            period: t,
            pass,
            flow_id: flow_id.to_string(),
            process_id: process_id.to_string(),
            value: stored,
            derivation,
        });
        Ok(stored)
    }

    /// Fail if any fully known process is out of balance
    fn check_conflicts(
        &self,
        graph: &MaterialGraph,
        t: usize,
        log: &mut EventLog,
    ) -> Result<(), BalanceError> {
        let mut offenders = Vec::new();
        let mut worst: f64 = 0.0;

        for idx in 0..self.incidence.process_count() {
            if self.incidence.role(idx) == ProcessRole::Boundary {
                continue;
            }
            let process_id = self.incidence.process_id(idx);
            let Some(imbalance) = graph.imbalance(process_id, t) else {
                continue;
            };
            if imbalance.abs() > self.config.tolerance {
                log.log(SolveEvent::BalanceViolation {
                    period: t,
                    process_id: process_id.to_string(),
                    imbalance,
                });
                offenders.push(process_id.to_string());
                worst = worst.max(imbalance.abs());
            }
        }

        if offenders.is_empty() {
            Ok(())
        } else {
            Err(BalanceError::OverdeterminedConflict {
                period: t,
                processes: offenders,
                imbalance: worst,
                tolerance: self.config.tolerance,
            })
        }
    }

    fn underdetermined(&self, graph: &MaterialGraph, settled: &[bool], t: usize) -> BalanceError {
        let flows: Vec<String> = graph
            .flows()
            .iter()
            .filter(|(_, f)| !f.value(t).is_known())
            .map(|(id, _)| id.clone())
            .collect();

        let mut processes: Vec<String> = (0..self.incidence.process_count())
            .filter(|&idx| !settled[idx] && self.incidence.role(idx) != ProcessRole::Boundary)
            .map(|idx| self.incidence.process_id(idx).to_string())
            .collect();

        if processes.is_empty() {
            // Only boundary-to-boundary flows are missing; name their endpoints
            for id in &flows {
                if let Some(flow) = graph.get_flow(id) {
                    processes.push(flow.origin().to_string());
                    processes.push(flow.destination().to_string());
                }
            }
            processes.sort();
            processes.dedup();
        }

        debug!(period = t, ?processes, ?flows, "period under-determined");
        BalanceError::Underdetermined {
            period: t,
            processes,
            flows,
        }
    }
}
