//! cadence: pull-based record cursors, budgeted key maps and the relational
//! operators built on them.
//!
//! This crate only re-exports the workspace members; integration tests and
//! benches live next to it.

pub use cadence_core as core;
pub use cadence_mem as mem;
pub use cadence_operators as operators;
