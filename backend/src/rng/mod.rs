//! Deterministic random permutations
//!
//! Used only to permute the propagator's scan order; solved values never
//! depend on randomness.

mod xorshift;

pub use xorshift::ScanRng;
