//! Cursor and factory traits + the operator error type.
//!
//! A query plan is a tree of [`RecordCursorFactory`] values. Each execution
//! asks the root factory for a cursor; the cursor borrows the factory (its
//! sinks, its map slot, its children) for as long as it is alive, so a factory
//! serves one execution at a time. Dropping the cursor closes it: child
//! cursors are dropped and the map memory goes back to the budget.
//!
//! Cursors are pulled synchronously by their parent. Any loop whose length is
//! bounded only by input size polls the execution's circuit breaker.

use cadence_core::prelude::{
    ExecutionContext, Record, RecordMetadata, RecordSource, RowId, SymbolTable,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpError {
    #[error(transparent)]
    Core(#[from] cadence_core::error::Error),

    #[error(transparent)]
    Mem(#[from] cadence_mem::error::Error),

    #[error("planning error: {0}")]
    Plan(String),

    #[error("execution error: {0}")]
    Exec(String),

    #[error("schema error: {0}")]
    Schema(String),
}

impl OpError {
    /// True when the pull was aborted by the circuit breaker, as opposed to
    /// failing on data or resources.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, OpError::Core(e) if e.is_cancellation())
    }
}

/// Pull-based iteration over records.
///
/// Record A (`record()`) follows `has_next`. Record B (`record_b()`) is a
/// second view over the same cursor, positioned only by `record_at`.
/// Row ids are only meaningful when replayed against the cursor that produced
/// them.
pub trait RecordCursor: RecordSource {
    /// Advance record A. `Ok(false)` is end of data; cancellation is an error.
    fn has_next(&mut self) -> Result<bool, OpError>;

    /// Record A.
    fn record(&self) -> Record<'_>;

    /// Record B, for cursors that support random access.
    fn record_b(&self) -> Result<Record<'_>, OpError>;

    /// Position record B on `row_id`.
    fn record_at(&mut self, row_id: RowId) -> Result<(), OpError>;

    /// Rewind to before the first row.
    fn to_top(&mut self) -> Result<(), OpError>;

    /// Row count when known up front.
    fn size(&self) -> Option<u64>;

    /// Dictionary of a symbol column, if the column is dictionary encoded.
    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable>;
}

/// Compiled, reusable producer of cursors.
pub trait RecordCursorFactory {
    fn metadata(&self) -> &RecordMetadata;

    /// Bind a cursor for one execution. Whatever the factory opened before a
    /// failure is released before the error is returned.
    fn get_cursor<'a>(
        &'a mut self,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError>;

    /// Whether cursors support `record_b`/`record_at`.
    fn supports_random_access(&self) -> bool;

    fn has_descending_order(&self) -> bool {
        false
    }
}
