//! Process model
//!
//! A process is a node of the flow graph. It owns no flows; flows refer to
//! processes by identifier.

use serde::{Deserialize, Serialize};

/// A node in the material flow graph
///
/// # Example
/// ```
/// use mfa_core_rs::Process;
///
/// let process = Process::new("use", "In-use stock").with_stock();
/// assert_eq!(process.id(), "use");
/// assert!(process.has_stock());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Unique identifier
    id: String,

    /// Human readable label
    label: String,

    /// Whether a stock accumulates at this process
    has_stock: bool,
}

impl Process {
    /// Create a process without a stock
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            has_stock: false,
        }
    }

    /// Mark the process as stock-bearing
    pub fn with_stock(mut self) -> Self {
        self.has_stock = true;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn has_stock(&self) -> bool {
        self.has_stock
    }
}
