//! INTERSECT and EXCEPT over inputs whose column types unify through casts.
//!
//! Binding drains side B into a membership map and drops B's cursor right
//! away. Side A is then streamed and each row is kept or skipped on its
//! membership; a second map makes sure each distinct row is emitted once.
//!
//! B is read once per binding: `to_top` rewinds only A and the membership map
//! is kept, so B's contents are taken as fixed for the life of the cursor.

use serde::{Deserialize, Serialize};

use cadence_core::prelude::{
    CircuitBreaker, EngineConfig, ExecutionContext, Record, RecordMetadata, RecordSource, RowId,
    Slot, SymbolTable, Value,
};
use cadence_mem::{FastMap, MapSlot, MemoryBudgetImpl};

use crate::cast::{cast_value, unify_metadata, CastFn, CastView};
use crate::sink::{ColumnFilter, RecordSink};
use crate::traits::{OpError, RecordCursor, RecordCursorFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOpKind {
    /// Rows of A that also occur in B.
    Intersect,
    /// Rows of A that do not occur in B.
    Except,
}

impl SetOpKind {
    fn keeps(self, in_b: bool) -> bool {
        in_b == (self == SetOpKind::Intersect)
    }
}

pub struct SetOpFactory {
    a: Box<dyn RecordCursorFactory>,
    b: Box<dyn RecordCursorFactory>,
    kind: SetOpKind,
    metadata: RecordMetadata,
    casts_a: Vec<CastFn>,
    casts_b: Vec<CastFn>,
    sink: RecordSink,
    members: MapSlot,
    emitted: MapSlot,
}

impl SetOpFactory {
    pub fn new(
        a: Box<dyn RecordCursorFactory>,
        b: Box<dyn RecordCursorFactory>,
        kind: SetOpKind,
        config: &EngineConfig,
        budget: &MemoryBudgetImpl,
    ) -> Result<Self, OpError> {
        let unified = unify_metadata(a.metadata(), b.metadata())?;
        let sink = RecordSink::new(&unified.metadata, &ColumnFilter::All)?;
        let map_config = config.set_op_map_config();
        Ok(Self {
            a,
            b,
            kind,
            metadata: unified.metadata,
            casts_a: unified.casts_a,
            casts_b: unified.casts_b,
            sink,
            members: MapSlot::allocate(map_config, 0, budget)?,
            emitted: MapSlot::allocate(map_config, 0, budget)?,
        })
    }

    pub fn intersect(
        a: Box<dyn RecordCursorFactory>,
        b: Box<dyn RecordCursorFactory>,
        config: &EngineConfig,
        budget: &MemoryBudgetImpl,
    ) -> Result<Self, OpError> {
        Self::new(a, b, SetOpKind::Intersect, config, budget)
    }

    pub fn except(
        a: Box<dyn RecordCursorFactory>,
        b: Box<dyn RecordCursorFactory>,
        config: &EngineConfig,
        budget: &MemoryBudgetImpl,
    ) -> Result<Self, OpError> {
        Self::new(a, b, SetOpKind::Except, config, budget)
    }

    pub fn kind(&self) -> SetOpKind {
        self.kind
    }
}

impl RecordCursorFactory for SetOpFactory {
    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn get_cursor<'a>(
        &'a mut self,
        ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        let members = self.members.acquire()?;
        let emitted = self.emitted.acquire()?;
        let cursor_a = self.a.get_cursor(ctx)?;
        let cursor_b = self.b.get_cursor(ctx)?;
        let mut cursor = SetOpCursor {
            cursor_a,
            sink: &self.sink,
            casts_a: &self.casts_a,
            kind: self.kind,
            members,
            emitted,
            circuit_breaker: ctx.circuit_breaker().clone(),
        };
        cursor.hash_b(cursor_b, &self.casts_b)?;
        Ok(Box::new(cursor))
    }

    fn supports_random_access(&self) -> bool {
        self.a.supports_random_access()
    }

    fn has_descending_order(&self) -> bool {
        self.a.has_descending_order()
    }
}

struct SetOpCursor<'a> {
    cursor_a: Box<dyn RecordCursor + 'a>,
    sink: &'a RecordSink,
    casts_a: &'a [CastFn],
    kind: SetOpKind,
    members: FastMap,
    emitted: FastMap,
    circuit_breaker: CircuitBreaker,
}

impl<'a> SetOpCursor<'a> {
    /// Drain B into the membership map. B is dropped on return, error or not.
    fn hash_b(
        &mut self,
        mut cursor_b: Box<dyn RecordCursor + 'a>,
        casts_b: &[CastFn],
    ) -> Result<(), OpError> {
        #[cfg(feature = "tracing")]
        let mut rows = 0u64;

        while cursor_b.has_next()? {
            self.circuit_breaker.check()?;
            let view = CastView::new(&*cursor_b, casts_b);
            view.check(Slot::A)?;
            let mut key = self.members.with_key();
            self.sink.copy(&Record::new(&view, Slot::A), &mut key)?;
            key.create()?;

            #[cfg(feature = "tracing")]
            {
                rows += 1;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(rows, keys = self.members.size(), kind = ?self.kind, "set op build side hashed");
        Ok(())
    }
}

impl RecordSource for SetOpCursor<'_> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        cast_value(self.casts_a, self.cursor_a.value(slot, column), column)
    }

    fn row_id(&self, slot: Slot) -> RowId {
        self.cursor_a.row_id(slot)
    }
}

impl RecordCursor for SetOpCursor<'_> {
    fn has_next(&mut self) -> Result<bool, OpError> {
        while self.cursor_a.has_next()? {
            self.circuit_breaker.check()?;
            let view = CastView::new(&*self.cursor_a, self.casts_a);
            view.check(Slot::A)?;
            let record = Record::new(&view, Slot::A);

            let mut key = self.members.with_key();
            self.sink.copy(&record, &mut key)?;
            if !self.kind.keeps(key.find_value().is_some()) {
                continue;
            }

            let mut key = self.emitted.with_key();
            self.sink.copy(&record, &mut key)?;
            if key.create()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn record(&self) -> Record<'_> {
        Record::new(self, Slot::A)
    }

    /// Bound to side A; side B is gone once the cursor is bound.
    fn record_b(&self) -> Result<Record<'_>, OpError> {
        Ok(Record::new(self, Slot::B))
    }

    fn record_at(&mut self, row_id: RowId) -> Result<(), OpError> {
        self.cursor_a.record_at(row_id)
    }

    fn to_top(&mut self) -> Result<(), OpError> {
        self.emitted.clear();
        self.cursor_a.to_top()
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable> {
        match self.casts_a.get(column) {
            Some(CastFn::Identity) => self.cursor_a.symbol_table(column),
            _ => None,
        }
    }
}
