//! Distinct over a timestamp-ordered input.
//!
//! Rows are only compared with rows of the same timestamp. A row whose
//! timestamp differs from the previous one is distinct without touching the
//! map; within a run of equal timestamps the map holds the keys already
//! emitted, seeded lazily with the run's first row the first time a second
//! row shows up. So at most one run is resident at a time.

use cadence_core::prelude::{
    CircuitBreaker, EngineConfig, ExecutionContext, Record, RecordMetadata, RecordSource, RowId,
    Slot, SymbolTable, Value,
};
use cadence_mem::{FastMap, MapSlot, MemoryBudgetImpl};

use crate::sink::{ColumnFilter, RecordSink};
use crate::traits::{OpError, RecordCursor, RecordCursorFactory};

pub struct DistinctTimeSeriesFactory {
    base: Box<dyn RecordCursorFactory>,
    sink: RecordSink,
    map: MapSlot,
    timestamp_index: usize,
}

impl DistinctTimeSeriesFactory {
    /// `filter` selects the columns that decide distinctness (normally all).
    pub fn new(
        base: Box<dyn RecordCursorFactory>,
        filter: &ColumnFilter,
        config: &EngineConfig,
        budget: &MemoryBudgetImpl,
    ) -> Result<Self, OpError> {
        let timestamp_index = base
            .metadata()
            .timestamp_index
            .ok_or_else(|| OpError::Plan("distinct requires a designated timestamp".into()))?;
        if !base.supports_random_access() {
            return Err(OpError::Plan(
                "distinct requires a base cursor with random access".into(),
            ));
        }
        let sink = RecordSink::new(base.metadata(), filter)?;
        let map = MapSlot::allocate(config.distinct_map_config(), 0, budget)?;
        Ok(Self {
            base,
            sink,
            map,
            timestamp_index,
        })
    }

    /// Whether the map currently holds memory, i.e. no cursor has taken it.
    pub fn is_map_allocated(&self) -> bool {
        self.map.is_allocated()
    }
}

impl RecordCursorFactory for DistinctTimeSeriesFactory {
    fn metadata(&self) -> &RecordMetadata {
        self.base.metadata()
    }

    fn get_cursor<'a>(
        &'a mut self,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        let map = self.map.acquire()?;
        let base = self.base.get_cursor(ctx)?;
        let cursor = DistinctTimeSeriesCursor::bind(
            base,
            &self.sink,
            map,
            ctx.circuit_breaker().clone(),
            self.timestamp_index,
        )?;
        Ok(Box::new(cursor))
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn has_descending_order(&self) -> bool {
        self.base.has_descending_order()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Pull from the base cursor.
    ComputeNext,
    /// The first row was fetched at bind time and has not been handed out.
    ReuseCurrent,
    /// The base cursor was empty at bind time.
    NoRows,
}

struct DistinctTimeSeriesCursor<'a> {
    base: Box<dyn RecordCursor + 'a>,
    sink: &'a RecordSink,
    map: FastMap,
    circuit_breaker: CircuitBreaker,
    timestamp_index: usize,
    phase: Phase,
    prev_timestamp: Option<i64>,
    /// First row of the current run, until the map has been seeded with it.
    prev_row_id: Option<RowId>,
}

impl<'a> DistinctTimeSeriesCursor<'a> {
    fn bind(
        base: Box<dyn RecordCursor + 'a>,
        sink: &'a RecordSink,
        map: FastMap,
        circuit_breaker: CircuitBreaker,
        timestamp_index: usize,
    ) -> Result<Self, OpError> {
        let mut cursor = Self {
            base,
            sink,
            map,
            circuit_breaker,
            timestamp_index,
            phase: Phase::NoRows,
            prev_timestamp: None,
            prev_row_id: None,
        };
        cursor.prefetch()?;
        Ok(cursor)
    }

    fn prefetch(&mut self) -> Result<(), OpError> {
        if self.base.has_next()? {
            self.start_run()?;
            self.phase = Phase::ReuseCurrent;
        } else {
            self.phase = Phase::NoRows;
        }
        Ok(())
    }

    /// Remember the current row as the first of a new timestamp run.
    fn start_run(&mut self) -> Result<(), OpError> {
        let record = self.base.record();
        self.prev_timestamp = Some(record.get_timestamp(self.timestamp_index)?);
        self.prev_row_id = Some(record.row_id());
        Ok(())
    }

    fn is_not_dupe(&mut self) -> Result<bool, OpError> {
        if let Some(first) = self.prev_row_id.take() {
            self.base.record_at(first)?;
            self.map.clear();
            let mut key = self.map.with_key();
            self.sink.copy(&self.base.record_b()?, &mut key)?;
            key.create()?;

            #[cfg(feature = "tracing")]
            tracing::trace!(timestamp = ?self.prev_timestamp, "distinct run seeded");
        }

        let mut key = self.map.with_key();
        self.sink.copy(&self.base.record(), &mut key)?;
        Ok(key.create()?)
    }
}

impl RecordSource for DistinctTimeSeriesCursor<'_> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        self.base.value(slot, column)
    }

    fn row_id(&self, slot: Slot) -> RowId {
        self.base.row_id(slot)
    }
}

impl RecordCursor for DistinctTimeSeriesCursor<'_> {
    fn has_next(&mut self) -> Result<bool, OpError> {
        match self.phase {
            Phase::NoRows => Ok(false),
            Phase::ReuseCurrent => {
                self.phase = Phase::ComputeNext;
                Ok(true)
            }
            Phase::ComputeNext => {
                while self.base.has_next()? {
                    self.circuit_breaker.check()?;
                    let timestamp = self.base.record().get_timestamp(self.timestamp_index)?;
                    if self.prev_timestamp != Some(timestamp) {
                        self.start_run()?;
                        return Ok(true);
                    }
                    if self.is_not_dupe()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn record(&self) -> Record<'_> {
        Record::new(self, Slot::A)
    }

    fn record_b(&self) -> Result<Record<'_>, OpError> {
        Ok(Record::new(self, Slot::B))
    }

    fn record_at(&mut self, row_id: RowId) -> Result<(), OpError> {
        self.base.record_at(row_id)
    }

    fn to_top(&mut self) -> Result<(), OpError> {
        self.base.to_top()?;
        self.map.clear();
        self.prev_timestamp = None;
        self.prev_row_id = None;
        if self.phase != Phase::NoRows {
            self.phase = Phase::ComputeNext;
        }
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable> {
        self.base.symbol_table(column)
    }
}
