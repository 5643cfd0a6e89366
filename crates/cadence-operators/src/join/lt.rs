//! LT (as-of, strictly less than) join.
//!
//! For every master row, the joined slave row is the latest slave row with the
//! same join key and a timestamp strictly below the master's. Masters without
//! one still emit, with a null slave side.
//!
//! The slave is read once, front to back, as far as the current master's
//! timestamp requires. The map remembers, per join key, the row id of the most
//! recent slave row passed; the row itself is fetched again by id on a match.
//! The slave row that stopped the scan ("dangling") is re-inserted on the next
//! advance, before the scan resumes.

use cadence_core::prelude::{
    CircuitBreaker, EngineConfig, Error, ExecutionContext, Record, RecordMetadata, RecordSource,
    RowId, Slot, SymbolTable, Value,
};
use cadence_mem::{FastMap, MapSlot, MemoryBudgetImpl};

use crate::sink::{ColumnFilter, RecordSink};
use crate::traits::{OpError, RecordCursor, RecordCursorFactory};

/// Value layout: the slave row id as a LONG at offset 0.
const ROW_ID_OFFSET: usize = 0;
const VALUE_SIZE: usize = 8;

pub struct LtJoinLightFactory {
    master: Box<dyn RecordCursorFactory>,
    slave: Box<dyn RecordCursorFactory>,
    metadata: RecordMetadata,
    master_key_sink: RecordSink,
    slave_key_sink: RecordSink,
    map: MapSlot,
    column_split: usize,
    master_timestamp_index: usize,
    slave_timestamp_index: usize,
}

impl LtJoinLightFactory {
    pub fn new(
        master: Box<dyn RecordCursorFactory>,
        slave: Box<dyn RecordCursorFactory>,
        master_key: &ColumnFilter,
        slave_key: &ColumnFilter,
        config: &EngineConfig,
        budget: &MemoryBudgetImpl,
    ) -> Result<Self, OpError> {
        let master_timestamp_index = master
            .metadata()
            .timestamp_index
            .ok_or_else(|| OpError::Plan("lt join master has no designated timestamp".into()))?;
        let slave_timestamp_index = slave
            .metadata()
            .timestamp_index
            .ok_or_else(|| OpError::Plan("lt join slave has no designated timestamp".into()))?;
        if !slave.supports_random_access() {
            return Err(OpError::Plan("lt join slave must support random access".into()));
        }

        let master_key_sink = RecordSink::new(master.metadata(), master_key)?;
        let slave_key_sink = RecordSink::new(slave.metadata(), slave_key)?;
        if !master_key_sink.key_kinds().eq(slave_key_sink.key_kinds()) {
            return Err(OpError::Schema(
                "lt join key columns differ in type between master and slave".into(),
            ));
        }

        let metadata = RecordMetadata::join(master.metadata(), slave.metadata());
        let column_split = master.metadata().column_count();
        let map = MapSlot::allocate(config.join_map_config(), VALUE_SIZE, budget)?;
        Ok(Self {
            master,
            slave,
            metadata,
            master_key_sink,
            slave_key_sink,
            map,
            column_split,
            master_timestamp_index,
            slave_timestamp_index,
        })
    }

    pub fn is_map_allocated(&self) -> bool {
        self.map.is_allocated()
    }
}

impl RecordCursorFactory for LtJoinLightFactory {
    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn get_cursor<'a>(
        &'a mut self,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        let map = self.map.acquire()?;
        let master = self.master.get_cursor(ctx)?;
        let slave = self.slave.get_cursor(ctx)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            column_split = self.column_split,
            key_columns = self.master_key_sink.column_count(),
            "lt join cursor bound"
        );

        Ok(Box::new(LtJoinLightCursor {
            master,
            slave,
            master_key_sink: &self.master_key_sink,
            slave_key_sink: &self.slave_key_sink,
            map,
            circuit_breaker: ctx.circuit_breaker().clone(),
            column_split: self.column_split,
            master_timestamp_index: self.master_timestamp_index,
            slave_timestamp_index: self.slave_timestamp_index,
            slave_timestamp: i64::MIN,
            dangling: None,
            has_slave: false,
        }))
    }

    fn supports_random_access(&self) -> bool {
        false
    }

    fn has_descending_order(&self) -> bool {
        self.master.has_descending_order()
    }
}

struct LtJoinLightCursor<'a> {
    master: Box<dyn RecordCursor + 'a>,
    slave: Box<dyn RecordCursor + 'a>,
    master_key_sink: &'a RecordSink,
    slave_key_sink: &'a RecordSink,
    map: FastMap,
    circuit_breaker: CircuitBreaker,
    column_split: usize,
    master_timestamp_index: usize,
    slave_timestamp_index: usize,
    /// Timestamp of the last slave row read; never decreases.
    slave_timestamp: i64,
    /// Slave row that stopped the last scan, not yet in the map.
    dangling: Option<RowId>,
    has_slave: bool,
}

impl LtJoinLightCursor<'_> {
    fn put_slave_row(map: &mut FastMap, sink: &RecordSink, record: &Record<'_>) -> Result<(), OpError> {
        let row_id = record.row_id();
        let mut key = map.with_key();
        sink.copy(record, &mut key)?;
        key.create_value()?
            .put_long(ROW_ID_OFFSET, row_id.get() as i64)?;
        Ok(())
    }

    /// Read slave rows until one is not older than `master_timestamp`.
    fn advance_slave(&mut self, master_timestamp: i64) -> Result<(), OpError> {
        if let Some(row_id) = self.dangling.take() {
            self.slave.record_at(row_id)?;
            Self::put_slave_row(&mut self.map, self.slave_key_sink, &self.slave.record_b()?)?;
        }

        let mut slave_timestamp = self.slave_timestamp;
        while self.slave.has_next()? {
            self.circuit_breaker.check()?;
            let record = self.slave.record();
            slave_timestamp = record.get_timestamp(self.slave_timestamp_index)?;
            if slave_timestamp < master_timestamp {
                Self::put_slave_row(&mut self.map, self.slave_key_sink, &record)?;
            } else {
                self.dangling = Some(record.row_id());
                break;
            }
        }
        self.slave_timestamp = slave_timestamp;
        Ok(())
    }
}

impl RecordSource for LtJoinLightCursor<'_> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        if slot == Slot::B {
            return Value::Null;
        }
        if column < self.column_split {
            self.master.value(Slot::A, column)
        } else if self.has_slave {
            self.slave.value(Slot::B, column - self.column_split)
        } else {
            Value::Null
        }
    }

    fn row_id(&self, _slot: Slot) -> RowId {
        self.master.row_id(Slot::A)
    }
}

impl RecordCursor for LtJoinLightCursor<'_> {
    fn has_next(&mut self) -> Result<bool, OpError> {
        if !self.master.has_next()? {
            return Ok(false);
        }
        let master_timestamp = self
            .master
            .record()
            .get_timestamp(self.master_timestamp_index)?;
        if self.slave_timestamp < master_timestamp {
            self.advance_slave(master_timestamp)?;
        }

        let mut key = self.map.with_key();
        self.master_key_sink.copy(&self.master.record(), &mut key)?;
        let slave_row = match key.find_value() {
            Some(value) => Some(value.get_long(ROW_ID_OFFSET)?),
            None => None,
        };
        match slave_row {
            Some(raw) => {
                self.slave.record_at(RowId::new(raw as u64))?;
                self.has_slave = true;
            }
            None => self.has_slave = false,
        }
        Ok(true)
    }

    fn record(&self) -> Record<'_> {
        Record::new(self, Slot::A)
    }

    fn record_b(&self) -> Result<Record<'_>, OpError> {
        Err(Error::Unsupported("lt join has no random access").into())
    }

    fn record_at(&mut self, _row_id: RowId) -> Result<(), OpError> {
        Err(Error::Unsupported("lt join has no random access").into())
    }

    fn to_top(&mut self) -> Result<(), OpError> {
        self.map.clear();
        self.slave_timestamp = i64::MIN;
        self.dangling = None;
        self.has_slave = false;
        self.master.to_top()?;
        self.slave.to_top()
    }

    fn size(&self) -> Option<u64> {
        self.master.size()
    }

    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable> {
        if column < self.column_split {
            self.master.symbol_table(column)
        } else {
            self.slave.symbol_table(column - self.column_split)
        }
    }
}
