//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cadence_core::prelude::{
    CancelHandle, DataType, ExecutionContext, Field, Record, RecordMetadata, RecordSource, RowId,
    Scalar, Schema, Slot, SymbolTable, Value,
};
use cadence_operators::{InMemoryTable, OpError, RecordCursor, RecordCursorFactory};

/// `(ts TIMESTAMP, v LONG)` table.
pub fn ts_long_table(rows: &[(i64, i64)]) -> InMemoryTable {
    ordered_ts_long_table(rows, false)
}

/// `(ts TIMESTAMP, v LONG)` table that reports the given timestamp order.
pub fn ordered_ts_long_table(rows: &[(i64, i64)], descending: bool) -> InMemoryTable {
    let metadata = RecordMetadata::new(
        Schema::new(vec![
            Field::new("ts", DataType::Timestamp, false),
            Field::new("v", DataType::Int64, true),
        ]),
        Some(0),
    )
    .unwrap();
    InMemoryTable::builder(metadata)
        .rows(rows.iter().map(|&(ts, v)| vec![Scalar::Ts(ts), Scalar::I64(v)]))
        .unwrap()
        .descending(descending)
        .build()
}

/// `(ts TIMESTAMP, sym SYMBOL, val STRING)` table with a shared dictionary.
pub fn quotes_table(rows: &[(i64, &str, &str)]) -> InMemoryTable {
    let metadata = RecordMetadata::new(
        Schema::new(vec![
            Field::new("ts", DataType::Timestamp, false),
            Field::new("sym", DataType::Symbol, true),
            Field::new("val", DataType::Utf8, true),
        ]),
        Some(0),
    )
    .unwrap();
    let dict = ["AAPL", "MSFT", "IBM", "k"];
    InMemoryTable::builder(metadata)
        .symbols(1, dict)
        .unwrap()
        .rows(rows.iter().map(|&(ts, sym, val)| {
            let sym = match dict.iter().position(|d| *d == sym) {
                Some(key) => Scalar::Sym(key as i32),
                None => Scalar::Str(sym.to_string()),
            };
            vec![Scalar::Ts(ts), sym, Scalar::Str(val.to_string())]
        }))
        .unwrap()
        .build()
}

/// Single column table of the given type.
pub fn column_table(data_type: DataType, values: Vec<Scalar>) -> InMemoryTable {
    let metadata = RecordMetadata::new(
        Schema::new(vec![Field::new("v", data_type, true)]),
        None,
    )
    .unwrap();
    InMemoryTable::builder(metadata)
        .rows(values.into_iter().map(|v| vec![v]))
        .unwrap()
        .build()
}

/// Drain every column of every row as owned scalars.
pub fn drain(cursor: &mut dyn RecordCursor, columns: usize) -> Result<Vec<Vec<Scalar>>, OpError> {
    let mut rows = Vec::new();
    while cursor.has_next()? {
        let record = cursor.record();
        rows.push((0..columns).map(|c| record.value(c).to_scalar()).collect());
    }
    Ok(rows)
}

/// Factory that always fails to bind.
pub struct FailingFactory {
    metadata: RecordMetadata,
}

impl FailingFactory {
    pub fn like(other: &dyn RecordCursorFactory) -> Self {
        Self {
            metadata: other.metadata().clone(),
        }
    }
}

impl RecordCursorFactory for FailingFactory {
    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn get_cursor<'a>(
        &'a mut self,
        _ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        Err(OpError::Exec("storage unavailable".into()))
    }

    fn supports_random_access(&self) -> bool {
        true
    }
}

/// Wraps a factory, counting live cursors, logging the row id of every row
/// its cursors produce, and optionally tripping a cancel handle once a number
/// of rows has been pulled.
pub struct Tracked<F> {
    inner: F,
    live: Arc<AtomicUsize>,
    produced: Arc<Mutex<Vec<RowId>>>,
    trip: Option<(usize, CancelHandle)>,
}

impl<F: RecordCursorFactory> Tracked<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            live: Arc::new(AtomicUsize::new(0)),
            produced: Arc::new(Mutex::new(Vec::new())),
            trip: None,
        }
    }

    pub fn cancel_after(mut self, rows: usize, handle: CancelHandle) -> Self {
        self.trip = Some((rows, handle));
        self
    }

    pub fn live_cursors(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.live)
    }

    /// Row ids handed out by `has_next`, in pull order, across all cursors.
    pub fn produced_rows(&self) -> Arc<Mutex<Vec<RowId>>> {
        Arc::clone(&self.produced)
    }
}

impl<F: RecordCursorFactory> RecordCursorFactory for Tracked<F> {
    fn metadata(&self) -> &RecordMetadata {
        self.inner.metadata()
    }

    fn get_cursor<'a>(
        &'a mut self,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        let inner = self.inner.get_cursor(ctx)?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedCursor {
            inner,
            live: Arc::clone(&self.live),
            produced: Arc::clone(&self.produced),
            trip: self.trip.clone(),
            pulled: 0,
        }))
    }

    fn supports_random_access(&self) -> bool {
        self.inner.supports_random_access()
    }

    fn has_descending_order(&self) -> bool {
        self.inner.has_descending_order()
    }
}

struct TrackedCursor<'a> {
    inner: Box<dyn RecordCursor + 'a>,
    live: Arc<AtomicUsize>,
    produced: Arc<Mutex<Vec<RowId>>>,
    trip: Option<(usize, CancelHandle)>,
    pulled: usize,
}

impl Drop for TrackedCursor<'_> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RecordSource for TrackedCursor<'_> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        self.inner.value(slot, column)
    }

    fn row_id(&self, slot: Slot) -> RowId {
        self.inner.row_id(slot)
    }
}

impl RecordCursor for TrackedCursor<'_> {
    fn has_next(&mut self) -> Result<bool, OpError> {
        self.pulled += 1;
        if let Some((after, handle)) = &self.trip {
            if self.pulled > *after {
                handle.cancel();
            }
        }
        let has_next = self.inner.has_next()?;
        if has_next {
            self.produced.lock().unwrap().push(self.inner.row_id(Slot::A));
        }
        Ok(has_next)
    }

    fn record(&self) -> Record<'_> {
        Record::new(self, Slot::A)
    }

    fn record_b(&self) -> Result<Record<'_>, OpError> {
        Ok(Record::new(self, Slot::B))
    }

    fn record_at(&mut self, row_id: RowId) -> Result<(), OpError> {
        self.inner.record_at(row_id)
    }

    fn to_top(&mut self) -> Result<(), OpError> {
        self.pulled = 0;
        self.inner.to_top()
    }

    fn size(&self) -> Option<u64> {
        self.inner.size()
    }

    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable> {
        self.inner.symbol_table(column)
    }
}
