#![forbid(unsafe_code)]
//! cadence-operators: the record cursor protocol and the operators built on it.
//!
//! Design intent:
//! - Pull-based and synchronous; one cursor tree serves one execution.
//! - Map memory is allocated through `cadence-mem` when a factory is built,
//!   handed to the cursor at bind time and returned to the budget when the
//!   cursor is dropped.
//! - Every loop bounded only by input size polls the circuit breaker.

pub mod cast;
pub mod distinct;
pub mod join;
pub mod set;
pub mod sink;
pub mod table;
pub mod traits;

pub use cast::{unify_metadata, CastFn, CastView, UnifiedMetadata};
pub use distinct::DistinctTimeSeriesFactory;
pub use join::LtJoinLightFactory;
pub use set::{SetOpFactory, SetOpKind};
pub use sink::{ColumnFilter, KeyKind, RecordSink};
pub use table::{DictSymbolTable, InMemoryTable, TableBuilder, TableCursor};
pub use traits::{OpError, RecordCursor, RecordCursorFactory};
