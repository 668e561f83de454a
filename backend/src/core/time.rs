//! Time horizon for the flow model
//!
//! The model operates in discrete periods (usually years). A `Horizon` names
//! the periods; a `PeriodCursor` walks them strictly in increasing order,
//! which the stock engine depends on.

use serde::{Deserialize, Serialize};

/// Ordered, labelled periods of a scenario
///
/// # Example
/// ```
/// use mfa_core_rs::Horizon;
///
/// let horizon = Horizon::from_years(2020, 2024);
/// assert_eq!(horizon.len(), 5);
/// assert_eq!(horizon.label(0), Some("2020"));
/// assert_eq!(horizon.index_of("2023"), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Horizon {
    /// Period labels, index = period number
    labels: Vec<String>,
}

impl Horizon {
    /// Create a horizon from explicit labels
    ///
    /// # Panics
    /// Panics if `labels` is empty
    pub fn new(labels: Vec<String>) -> Self {
        assert!(!labels.is_empty(), "horizon must contain at least one period");
        Self { labels }
    }

    /// Create a horizon of `count` periods labelled `0..count`
    ///
    /// # Example
    /// ```
    /// use mfa_core_rs::Horizon;
    ///
    /// let horizon = Horizon::with_periods(3);
    /// assert_eq!(horizon.label(2), Some("2"));
    /// ```
    pub fn with_periods(count: usize) -> Self {
        Self::new((0..count).map(|t| t.to_string()).collect())
    }

    /// Create a horizon of consecutive years, both ends inclusive
    pub fn from_years(first: i32, last: i32) -> Self {
        assert!(last >= first, "last year must not precede first year");
        Self::new((first..=last).map(|y| y.to_string()).collect())
    }

    /// Number of periods
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Check if the horizon has no periods (only possible for deserialized input)
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of period `t`
    pub fn label(&self, t: usize) -> Option<&str> {
        self.labels.get(t).map(|s| s.as_str())
    }

    /// Period index of a label
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// All labels in period order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Start a cursor at period 0
    pub fn cursor(&self) -> PeriodCursor {
        PeriodCursor::new(self.len())
    }
}

/// Walks the periods of a horizon in strictly increasing order
///
/// # Example
/// ```
/// use mfa_core_rs::Horizon;
///
/// let horizon = Horizon::with_periods(2);
/// let mut cursor = horizon.cursor();
/// assert_eq!(cursor.current(), Some(0));
/// cursor.advance();
/// assert_eq!(cursor.current(), Some(1));
/// assert!(cursor.is_last());
/// cursor.advance();
/// assert_eq!(cursor.current(), None);
/// ```
#[derive(Debug, Clone)]
pub struct PeriodCursor {
    /// Next period to be solved
    current: usize,
    /// Total number of periods
    total: usize,
}

impl PeriodCursor {
    /// Create a cursor over `total` periods; zero periods yields an exhausted cursor
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Current period, or `None` once the horizon is exhausted
    pub fn current(&self) -> Option<usize> {
        (self.current < self.total).then_some(self.current)
    }

    /// Move to the next period
    pub fn advance(&mut self) {
        if self.current < self.total {
            self.current += 1;
        }
    }

    /// Check if the current period is the final one
    pub fn is_last(&self) -> bool {
        self.total > 0 && self.current + 1 == self.total
    }

    /// Number of periods already passed
    pub fn completed(&self) -> usize {
        self.current
    }

    /// Total number of periods
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for PeriodCursor {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let t = self.current()?;
        self.advance();
        Some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "horizon must contain at least one period")]
    fn test_empty_horizon_panics() {
        Horizon::new(Vec::new());
    }

    #[test]
    fn test_cursor_iterates_in_order() {
        let periods: Vec<usize> = Horizon::with_periods(4).cursor().collect();
        assert_eq!(periods, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_zero_periods_yield_nothing() {
        let mut cursor = PeriodCursor::new(0);
        assert_eq!(cursor.current(), None);
        assert!(!cursor.is_last());
        assert_eq!(cursor.next(), None);
        assert_eq!(cursor.completed(), 0);
    }

    #[test]
    fn test_deserialized_empty_horizon() {
        let horizon: Horizon = serde_json::from_str(r#"{"labels": []}"#).unwrap();
        assert!(horizon.is_empty());
        assert_eq!(horizon.cursor().count(), 0);
    }

    #[test]
    fn test_advance_saturates() {
        let mut cursor = PeriodCursor::new(1);
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.completed(), 1);
        assert_eq!(cursor.current(), None);
    }
}
