//! FFI boundary for Python (PyO3)
//!
//! Inputs and outputs cross the boundary as JSON strings, so the Python
//! side deals with plain dicts and this module stays a thin wrapper.

pub mod runner;
