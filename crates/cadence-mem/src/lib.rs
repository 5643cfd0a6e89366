#![forbid(unsafe_code)]
//! cadence-mem: hard memory budgeting, budgeted pages and the operator map.
//!
//! This crate provides concrete implementations for the *interfaces* defined
//! in `cadence-core::budget`. Every map page and slot table is backed by an
//! RAII guard, so dropping or closing a map is what returns its memory.

pub mod error;
pub mod guard;
pub mod map;
pub mod pool;
pub mod tracking;

pub use error::{Error, Result};
pub use guard::{BudgetGuardImpl, MemoryBudgetImpl};
pub use map::{FastMap, MapKey, MapSlot, MapValue, ReleasedMap};
pub use pool::{BufferPool, OwnedBuf};
