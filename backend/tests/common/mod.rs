//! Shared builders for integration tests

#![allow(dead_code)]

use mfa_core_rs::{
    FlowSpec, Horizon, LifetimeDistribution, ScenarioData, ScenarioInput, ScenarioSolver,
    SolveError, SolverConfig,
};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (`RUST_LOG` filters it)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A -> B -> C with A->B given as [10, 12, 8] and B->C unknown
pub fn pass_through() -> ScenarioInput {
    ScenarioInput::new("pass_through", Horizon::with_periods(3))
        .process("A", "Source")
        .process("B", "Transfer")
        .process("C", "Sink")
        .flow(FlowSpec::absolute(
            "A",
            "B",
            vec![Some(10.0), Some(12.0), Some(8.0)],
        ))
        .flow(FlowSpec::absolute("B", "C", vec![None, None, None]))
}

/// mine -> use (stock) -> waste, with the given inflow series into the stock
pub fn single_stock(inflows: &[f64], lifetime: LifetimeDistribution) -> ScenarioInput {
    let periods = inflows.len();
    ScenarioInput::new("single_stock", Horizon::with_periods(periods))
        .process("mine", "Mining")
        .stock_process("use", "In use", lifetime)
        .process("waste", "Waste")
        .flow(FlowSpec::absolute(
            "mine",
            "use",
            inflows.iter().map(|&v| Some(v)).collect(),
        ))
        .flow(FlowSpec::absolute("use", "waste", vec![None; periods]))
}

/// Product system with a recycling loop through an in-use stock
///
/// ```text
/// mine -> fab -> use(stock) -> collect -> recycle -> fab
///                                      \-> landfill
/// ```
///
/// Only primary input and the recycling share are given.
pub fn recycling_loop(primary: &[f64], recycling_share: f64, lifetime: LifetimeDistribution) -> ScenarioInput {
    let periods = primary.len();
    ScenarioInput::new("recycling", Horizon::with_periods(periods))
        .process("mine", "Mining")
        .process("fab", "Fabrication")
        .stock_process("use", "In use", lifetime)
        .process("collect", "Collection")
        .process("recycle", "Recycling")
        .process("landfill", "Landfill")
        .flow(FlowSpec::absolute(
            "mine",
            "fab",
            primary.iter().map(|&v| Some(v)).collect(),
        ))
        .flow(FlowSpec::absolute("fab", "use", vec![None; periods]))
        .flow(FlowSpec::absolute("use", "collect", vec![None; periods]))
        .flow(FlowSpec::relative("collect", "recycle", vec![recycling_share; periods]))
        .flow(FlowSpec::absolute("collect", "landfill", vec![None; periods]))
        .flow(FlowSpec::absolute("recycle", "fab", vec![None; periods]))
}

pub fn solve(input: &ScenarioInput) -> Result<ScenarioData, SolveError> {
    solve_with(input, SolverConfig::default())
}

pub fn solve_with(input: &ScenarioInput, config: SolverConfig) -> Result<ScenarioData, SolveError> {
    init_tracing();
    ScenarioSolver::new(config)?.solve(input)
}

/// Values of a flow, panicking on unknown periods
pub fn values(data: &ScenarioData, flow: &str) -> Vec<f64> {
    data.graph()
        .get_flow(flow)
        .unwrap_or_else(|| panic!("no flow {}", flow))
        .values()
        .iter()
        .map(|v| v.value().unwrap_or_else(|| panic!("{} has unknown periods", flow)))
        .collect()
}
