//! Convenient re-exports for downstream crates.

pub use crate::circuit_breaker::{CancelHandle, CircuitBreaker};
pub use crate::config::{EngineConfig, MapConfig};
pub use crate::context::ExecutionContext;
pub use crate::error::{Error, Result};
pub use crate::id::{CursorId, RowId};
pub use crate::record::{Record, RecordSource, Slot, SymbolTable};
pub use crate::schema::{DataType, Field, RecordMetadata, Schema};
pub use crate::types::{Scalar, Value, NULL_INT, NULL_LONG, NULL_TIMESTAMP};
