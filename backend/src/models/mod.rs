//! Domain models for the material flow system

pub mod event;
pub mod flow;
pub mod graph;
pub mod process;
pub mod scenario;
pub mod stock;

// Re-exports
pub use event::{Derivation, EventLog, SolveEvent};
pub use flow::{Flow, FlowError, FlowKind, FlowValue};
pub use graph::{MaterialGraph, ModelError};
pub use process::Process;
pub use scenario::{
    FlowModifier, FlowSpec, FlowValues, ProcessSpec, ScenarioInput, StockSpec, ValueChange,
};
pub use stock::{Cohort, CohortArena, Stock, StockHistory, StockStep};
