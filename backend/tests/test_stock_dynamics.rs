//! Tests for the cohort-based stock engine

use approx::assert_relative_eq;
use mfa_core_rs::dynamics::{StockEngine, StockError};
use mfa_core_rs::lifetime::{LifetimeDistribution, SurvivalCache};
use mfa_core_rs::Stock;

// ============================================================================
// Reference example
// ============================================================================

#[test]
fn test_fixed_lifetime_two_periods() {
    // Inflow [10, 10, 10, 0] with a fixed lifetime of 2 periods
    let engine = StockEngine::default();
    let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 2.0 });

    let steps = engine.run(&mut stock, &[10.0, 10.0, 10.0, 0.0]).unwrap();
    let outflows: Vec<f64> = steps.iter().map(|s| s.outflow).collect();
    let levels: Vec<f64> = steps.iter().map(|s| s.level).collect();

    assert_eq!(outflows, vec![0.0, 0.0, 10.0, 10.0]);
    assert_eq!(levels, vec![10.0, 20.0, 20.0, 10.0]);
    assert_eq!(stock.history().outflow, outflows);
    assert_eq!(stock.history().level, levels);
}

// ============================================================================
// Conservation and bounds
// ============================================================================

#[test]
fn test_level_changes_by_inflow_minus_outflow() {
    let engine = StockEngine::default();
    let mut stock = Stock::new(
        "use",
        LifetimeDistribution::Normal {
            mean: 4.0,
            std_dev: 1.5,
        },
    );
    let inflows = [5.0, 7.5, 0.0, 3.2, 11.0, 0.0, 0.0, 2.0, 9.9, 1.0];

    let mut previous = 0.0;
    for (t, &inflow) in inflows.iter().enumerate() {
        let step = engine.advance(&mut stock, inflow, t).unwrap();
        assert_relative_eq!(step.level, previous + inflow - step.outflow, epsilon = 1e-9);
        assert!(step.outflow >= 0.0);
        assert!(step.outflow <= previous + 1e-12);
        assert_relative_eq!(stock.cohorts().total(), step.level, epsilon = 1e-9);
        previous = step.level;
    }
}

#[test]
fn test_every_cohort_eventually_leaves_fixed_stock() {
    let engine = StockEngine::default();
    let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 3.0 });
    engine
        .run(&mut stock, &[4.0, 6.0, 0.0, 0.0, 0.0, 0.0])
        .unwrap();

    let history = stock.history();
    assert_eq!(history.outflow, vec![0.0, 0.0, 0.0, 4.0, 6.0, 0.0]);
    assert_eq!(history.level.last(), Some(&0.0));
    assert_eq!(stock.cohorts().live(), 0);
}

#[test]
fn test_net_change_matches_flows() {
    let engine = StockEngine::default();
    let mut stock = Stock::new(
        "use",
        LifetimeDistribution::Weibull {
            shape: 2.0,
            scale: 3.0,
        },
    );
    engine.run(&mut stock, &[10.0, 0.0, 5.0, 0.0]).unwrap();

    let history = stock.history();
    for (t, delta) in history.net_change().iter().enumerate() {
        assert_relative_eq!(*delta, history.inflow[t] - history.outflow[t], epsilon = 1e-12);
    }
}

// ============================================================================
// Cohort bookkeeping
// ============================================================================

#[test]
fn test_cohort_snapshots_recorded_per_period() {
    let engine = StockEngine::default();
    let mut stock = Stock::new(
        "use",
        LifetimeDistribution::Table {
            survival: vec![1.0, 0.5],
        },
    )
    .with_cohort_recording(true);

    engine.run(&mut stock, &[8.0, 2.0, 0.0]).unwrap();
    let cohorts = &stock.history().cohorts;
    assert_eq!(cohorts.len(), 3);

    // Period 1: first cohort halved, second cohort fresh
    let entries: Vec<(usize, f64)> = cohorts[1].iter().map(|c| (c.entry, c.remaining)).collect();
    assert_eq!(entries, vec![(0, 4.0), (1, 2.0)]);

    // Period 2: table ends, cohort 0 gone, cohort 1 halved
    let entries: Vec<(usize, f64)> = cohorts[2].iter().map(|c| (c.entry, c.remaining)).collect();
    assert_eq!(entries, vec![(1, 1.0)]);
    assert_eq!(stock.history().outflow, vec![0.0, 4.0, 5.0]);
}

#[test]
fn test_snapshots_skipped_when_disabled() {
    let engine = StockEngine::default();
    let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 1.0 })
        .with_cohort_recording(false);
    engine.run(&mut stock, &[1.0, 1.0]).unwrap();
    assert!(stock.history().cohorts.is_empty());
    assert_eq!(stock.history().level.len(), 2);
}

#[test]
fn test_long_horizon_keeps_cohort_count_bounded() {
    let engine = StockEngine::new(1e-8);
    let mut stock = Stock::new(
        "use",
        LifetimeDistribution::Weibull {
            shape: 3.0,
            scale: 5.0,
        },
    );
    engine.run(&mut stock, &vec![1.0; 500]).unwrap();

    // Weibull(3, 5) survival drops below 1e-8 well within 20 periods
    assert!(stock.cohorts().live() < 20);
    assert_relative_eq!(stock.cohorts().total(), stock.level(), epsilon = 1e-9);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_invalid_inflow_rejected_without_side_effects() {
    let engine = StockEngine::default();
    let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 2.0 });
    engine.advance(&mut stock, 3.0, 0).unwrap();

    for bad in [-0.5, f64::NAN, f64::INFINITY] {
        let err = engine.advance(&mut stock, bad, 1).unwrap_err();
        assert!(matches!(err, StockError::InvalidFlowValue { period: 1, .. }));
    }
    assert_eq!(stock.next_period(), 1);
    assert_eq!(stock.level(), 3.0);
    assert_eq!(stock.history().level, vec![3.0]);
}

#[test]
fn test_periods_must_be_consecutive() {
    let engine = StockEngine::default();
    let mut stock = Stock::new("use", LifetimeDistribution::Fixed { lifetime: 2.0 });
    engine.advance(&mut stock, 1.0, 0).unwrap();

    assert_eq!(
        engine.advance(&mut stock, 1.0, 0),
        Err(StockError::OutOfOrder {
            process: "use".to_string(),
            expected: 1,
            actual: 0
        })
    );
    assert!(engine.preview_outflow(&stock, 3).is_err());
}

// ============================================================================
// Engine agnostic to the family
// ============================================================================

#[test]
fn test_table_equivalent_to_fixed() {
    let engine = StockEngine::default();
    let inflows = [3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0];

    let mut fixed = Stock::new("a", LifetimeDistribution::Fixed { lifetime: 3.0 });
    let mut table = Stock::new(
        "b",
        LifetimeDistribution::Table {
            survival: vec![1.0, 1.0, 1.0],
        },
    );
    engine.run(&mut fixed, &inflows).unwrap();
    engine.run(&mut table, &inflows).unwrap();

    assert_eq!(fixed.history().outflow, table.history().outflow);
    assert_eq!(fixed.history().level, table.history().level);
}

#[test]
fn test_cached_curve_gives_same_results() {
    let cache = SurvivalCache::new();
    let dist = LifetimeDistribution::LogNormal {
        mean: 6.0,
        std_dev: 2.0,
    };
    let engine = StockEngine::default();
    let inflows = [2.0, 4.0, 8.0, 0.0, 1.0, 0.0, 0.0, 3.0];

    let mut plain = Stock::new("a", dist.clone());
    engine.run(&mut plain, &inflows).unwrap();

    // Build through a graph so the stock carries the cached curve
    let input = mfa_core_rs::ScenarioInput::new("s", mfa_core_rs::Horizon::with_periods(inflows.len()))
        .process("src", "Source")
        .stock_process("use", "Use", dist)
        .process("sink", "Sink")
        .flow(mfa_core_rs::FlowSpec::absolute(
            "src",
            "use",
            inflows.iter().map(|&v| Some(v)).collect(),
        ))
        .flow(mfa_core_rs::FlowSpec::absolute("use", "sink", vec![None; inflows.len()]));
    let mut graph = mfa_core_rs::MaterialGraph::build(&input, &cache, false).unwrap();
    let cached = graph.get_stock_mut("use").unwrap();
    engine.run(cached, &inflows).unwrap();

    for (a, b) in plain.history().outflow.iter().zip(&cached.history().outflow) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}
