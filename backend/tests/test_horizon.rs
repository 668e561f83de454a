//! Tests for Horizon and PeriodCursor

use mfa_core_rs::{Horizon, PeriodCursor};

#[test]
fn test_year_horizon_labels() {
    let horizon = Horizon::from_years(2000, 2049);
    assert_eq!(horizon.len(), 50);
    assert_eq!(horizon.label(0), Some("2000"));
    assert_eq!(horizon.label(49), Some("2049"));
    assert_eq!(horizon.label(50), None);
    assert_eq!(horizon.index_of("2025"), Some(25));
    assert_eq!(horizon.index_of("1999"), None);
}

#[test]
fn test_explicit_labels_keep_order() {
    let horizon = Horizon::new(vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()]);
    assert_eq!(horizon.labels(), &["Q1", "Q2", "Q3"]);
    assert!(!horizon.is_empty());
}

#[test]
#[should_panic(expected = "last year must not precede first year")]
fn test_reversed_years_panic() {
    Horizon::from_years(2030, 2020);
}

#[test]
fn test_cursor_visits_each_period_once_in_order() {
    let horizon = Horizon::with_periods(5);
    let visited: Vec<usize> = horizon.cursor().collect();
    assert_eq!(visited, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_cursor_saturates_at_end() {
    let mut cursor = PeriodCursor::new(2);
    assert!(!cursor.is_last());
    cursor.advance();
    assert!(cursor.is_last());
    cursor.advance();
    cursor.advance();
    assert_eq!(cursor.current(), None);
    assert_eq!(cursor.completed(), 2);
    assert_eq!(cursor.total(), 2);
}

#[test]
fn test_horizon_json_roundtrip() {
    let horizon = Horizon::from_years(2020, 2022);
    let json = serde_json::to_string(&horizon).unwrap();
    assert_eq!(serde_json::from_str::<Horizon>(&json).unwrap(), horizon);
}
