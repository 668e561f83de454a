//! Mass balance
//!
//! - `incidence`: per-process flow index and scan orders
//! - `propagator`: pass-based resolution of unknown flow values

pub mod incidence;
pub mod propagator;

pub use incidence::{Incidence, ProcessRole, ScanOrder};
pub use propagator::{BalanceError, PeriodReport, Propagator, PropagatorConfig};
