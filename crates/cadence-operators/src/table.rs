//! In-memory table: a row-store factory standing in for the storage layer.
//!
//! Every cursor it binds supports random access and knows its size. Row ids
//! carry the low 32 bits of the minting cursor's id in their high half, so a
//! row id replayed against another cursor is rejected instead of silently
//! landing on some other row.

use cadence_core::error::Error;
use cadence_core::prelude::{
    CursorId, DataType, ExecutionContext, Record, RecordMetadata, RecordSource, RowId, Scalar,
    Slot, SymbolTable, Value,
};

use crate::traits::{OpError, RecordCursor, RecordCursorFactory};

/// Symbol dictionary backed by a vector; key `i` is `values[i]`.
#[derive(Debug, Clone, Default)]
pub struct DictSymbolTable {
    values: Vec<String>,
}

impl DictSymbolTable {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl SymbolTable for DictSymbolTable {
    fn value_of(&self, key: i32) -> Option<&str> {
        usize::try_from(key)
            .ok()
            .and_then(|k| self.values.get(k))
            .map(String::as_str)
    }

    fn size(&self) -> usize {
        self.values.len()
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryTable {
    metadata: RecordMetadata,
    rows: Vec<Vec<Scalar>>,
    symbols: Vec<Option<DictSymbolTable>>,
    descending: bool,
}

pub struct TableBuilder {
    table: InMemoryTable,
}

impl TableBuilder {
    /// Attach a dictionary to a SYMBOL column; rows may then hold `Scalar::Sym(key)`.
    pub fn symbols<S: Into<String>>(
        mut self,
        column: usize,
        values: impl IntoIterator<Item = S>,
    ) -> Result<Self, OpError> {
        if self.table.metadata.column_type(column) != Some(DataType::Symbol) {
            return Err(OpError::Schema(format!("column {column} is not a SYMBOL column")));
        }
        self.table.symbols[column] = Some(DictSymbolTable::new(
            values.into_iter().map(Into::into).collect(),
        ));
        Ok(self)
    }

    pub fn row(mut self, row: Vec<Scalar>) -> Result<Self, OpError> {
        self.table.push_row(row)?;
        Ok(self)
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<Scalar>>) -> Result<Self, OpError> {
        for row in rows {
            self.table.push_row(row)?;
        }
        Ok(self)
    }

    /// Mark the table as ordered by descending timestamp.
    pub fn descending(mut self, descending: bool) -> Self {
        self.table.descending = descending;
        self
    }

    pub fn build(self) -> InMemoryTable {
        self.table
    }
}

impl InMemoryTable {
    pub fn builder(metadata: RecordMetadata) -> TableBuilder {
        let symbols = vec![None; metadata.column_count()];
        TableBuilder {
            table: InMemoryTable {
                metadata,
                rows: Vec::new(),
                symbols,
                descending: false,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn push_row(&mut self, row: Vec<Scalar>) -> Result<(), OpError> {
        if row.len() != self.metadata.column_count() {
            return Err(OpError::Schema(format!(
                "row has {} values, table has {} columns",
                row.len(),
                self.metadata.column_count()
            )));
        }
        for (field, value) in self.metadata.schema.fields.iter().zip(&row) {
            if !value.fits(field.data_type) {
                return Err(OpError::Schema(format!(
                    "value {value:?} does not fit column '{}' of type {}",
                    field.name,
                    field.data_type.name()
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    fn value_at(&self, row: usize, column: usize) -> Value<'_> {
        let Some(scalar) = self.rows.get(row).and_then(|r| r.get(column)) else {
            return Value::Null;
        };
        match scalar {
            Scalar::Sym(key) => self.symbols[column]
                .as_ref()
                .and_then(|t| t.value_of(*key))
                .map_or(Value::Null, Value::Symbol),
            Scalar::Str(s) if self.metadata.column_type(column) == Some(DataType::Symbol) => {
                Value::Symbol(s)
            }
            other => other.as_value(),
        }
    }
}

impl RecordCursorFactory for InMemoryTable {
    fn metadata(&self) -> &RecordMetadata {
        &self.metadata
    }

    fn get_cursor<'a>(
        &'a mut self,
        _ctx: &ExecutionContext,
    ) -> Result<Box<dyn RecordCursor + 'a>, OpError> {
        Ok(Box::new(TableCursor::new(self)))
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn has_descending_order(&self) -> bool {
        self.descending
    }
}

pub struct TableCursor<'a> {
    table: &'a InMemoryTable,
    id: CursorId,
    /// Index of record A; `None` before the first `has_next`.
    current: Option<usize>,
    /// Index of record B; `None` until `record_at`.
    positioned: Option<usize>,
}

const INDEX_MASK: u64 = 0xFFFF_FFFF;

impl<'a> TableCursor<'a> {
    pub fn new(table: &'a InMemoryTable) -> Self {
        Self {
            table,
            id: CursorId::next(),
            current: None,
            positioned: None,
        }
    }

    pub fn id(&self) -> CursorId {
        self.id
    }

    fn tag(&self) -> u64 {
        self.id.get() & INDEX_MASK
    }

    fn encode(&self, index: usize) -> RowId {
        RowId::new(self.tag() << 32 | index as u64)
    }

    fn decode(&self, row_id: RowId) -> Option<usize> {
        let raw = row_id.get();
        let index = (raw & INDEX_MASK) as usize;
        (raw >> 32 == self.tag() && index < self.table.len()).then_some(index)
    }

    fn index(&self, slot: Slot) -> Option<usize> {
        match slot {
            Slot::A => self.current,
            Slot::B => self.positioned,
        }
    }
}

impl RecordSource for TableCursor<'_> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        match self.index(slot) {
            Some(row) => self.table.value_at(row, column),
            None => Value::Null,
        }
    }

    fn row_id(&self, slot: Slot) -> RowId {
        // An unpositioned slot reports an index past the end, which record_at rejects.
        let index = self.index(slot).unwrap_or(INDEX_MASK as usize);
        self.encode(index)
    }
}

impl RecordCursor for TableCursor<'_> {
    fn has_next(&mut self) -> Result<bool, OpError> {
        let next = self.current.map_or(0, |i| i + 1);
        if next < self.table.len() {
            self.current = Some(next);
            Ok(true)
        } else {
            self.current = Some(self.table.len());
            Ok(false)
        }
    }

    fn record(&self) -> Record<'_> {
        Record::new(self, Slot::A)
    }

    fn record_b(&self) -> Result<Record<'_>, OpError> {
        Ok(Record::new(self, Slot::B))
    }

    fn record_at(&mut self, row_id: RowId) -> Result<(), OpError> {
        let index = self.decode(row_id).ok_or(Error::InvalidRowId {
            row_id,
            cursor: self.id,
        })?;
        self.positioned = Some(index);
        Ok(())
    }

    fn to_top(&mut self) -> Result<(), OpError> {
        self.current = None;
        Ok(())
    }

    fn size(&self) -> Option<u64> {
        Some(self.table.len() as u64)
    }

    fn symbol_table(&self, column: usize) -> Option<&dyn SymbolTable> {
        self.table
            .symbols
            .get(column)
            .and_then(Option::as_ref)
            .map(|t| t as &dyn SymbolTable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::prelude::{Field, Schema};

    fn table() -> InMemoryTable {
        let metadata = RecordMetadata::new(
            Schema::new(vec![
                Field::new("ts", DataType::Timestamp, false),
                Field::new("sym", DataType::Symbol, true),
            ]),
            Some(0),
        )
        .unwrap();
        InMemoryTable::builder(metadata)
            .symbols(1, ["AAPL", "MSFT"])
            .unwrap()
            .rows([
                vec![Scalar::Ts(1), Scalar::Sym(1)],
                vec![Scalar::Ts(2), Scalar::Str("IBM".into())],
                vec![Scalar::Ts(3), Scalar::Null],
            ])
            .unwrap()
            .build()
    }

    #[test]
    fn iterates_and_rewinds() {
        let mut table = table();
        let ctx = ExecutionContext::new();
        let mut cursor = table.get_cursor(&ctx).unwrap();
        assert_eq!(cursor.size(), Some(3));
        let mut seen = Vec::new();
        while cursor.has_next().unwrap() {
            let rec = cursor.record();
            seen.push((rec.get_timestamp(0).unwrap(), rec.get_str(1).map(str::to_string)));
        }
        assert_eq!(
            seen,
            vec![
                (1, Some("MSFT".to_string())),
                (2, Some("IBM".to_string())),
                (3, None)
            ]
        );
        assert!(!cursor.has_next().unwrap());
        cursor.to_top().unwrap();
        assert!(cursor.has_next().unwrap());
        assert_eq!(cursor.record().get_timestamp(0).unwrap(), 1);
        assert_eq!(cursor.symbol_table(1).unwrap().value_of(0), Some("AAPL"));
        assert!(cursor.symbol_table(0).is_none());
    }

    #[test]
    fn record_b_moves_independently() {
        let mut table = table();
        let ctx = ExecutionContext::new();
        let mut cursor = table.get_cursor(&ctx).unwrap();
        cursor.has_next().unwrap();
        let first = cursor.record().row_id();
        cursor.has_next().unwrap();
        cursor.record_at(first).unwrap();
        assert_eq!(cursor.record_b().unwrap().get_timestamp(0).unwrap(), 1);
        assert_eq!(cursor.record().get_timestamp(0).unwrap(), 2);
    }

    #[test]
    fn foreign_row_ids_are_rejected() {
        let table = table();
        let mut a = TableCursor::new(&table);
        let mut b = TableCursor::new(&table);
        a.has_next().unwrap();
        let row_id = a.record().row_id();
        assert!(matches!(
            b.record_at(row_id),
            Err(OpError::Core(Error::InvalidRowId { .. }))
        ));
        assert!(a.record_at(row_id).is_ok());
        assert!(a.record_at(RowId::new(0)).is_err());
    }

    #[test]
    fn order_flag_is_reported() {
        assert!(!table().has_descending_order());
        let metadata = table().metadata.clone();
        let desc = InMemoryTable::builder(metadata).descending(true).build();
        assert!(desc.has_descending_order());
        assert!(desc.is_empty());
    }

    #[test]
    fn rows_are_checked_against_the_schema() {
        let metadata = RecordMetadata::new(
            Schema::new(vec![Field::new("v", DataType::Int64, true)]),
            None,
        )
        .unwrap();
        assert!(InMemoryTable::builder(metadata.clone())
            .row(vec![Scalar::I32(1)])
            .is_err());
        assert!(InMemoryTable::builder(metadata.clone())
            .row(vec![Scalar::I64(1), Scalar::I64(2)])
            .is_err());
        assert!(InMemoryTable::builder(metadata).symbols(0, ["x"]).is_err());
    }
}
