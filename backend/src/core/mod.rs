//! Time horizon and period ordering

pub mod time;

pub use time::{Horizon, PeriodCursor};
