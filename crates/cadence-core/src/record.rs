//! The record model every operator reads through.
//!
//! A cursor exposes two positioned views over its rows: record A follows
//! `has_next`, record B is re-positioned on demand by `record_at(row_id)`.
//! Both are reached through [`RecordSource`], which cursors implement; a
//! [`Record`] is just a `(source, slot)` pair with typed accessors on top, so
//! composite cursors (joins, cast views) can hand out records without owning
//! any per-row state.

use std::fmt;

use crate::error::{Error, Result};
use crate::id::RowId;
use crate::timestamp::parse_floor_partial;
use crate::types::{Value, NULL_INT, NULL_LONG, NULL_TIMESTAMP};

/// Which positioned view of a cursor a record reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Current row, advanced by `has_next`.
    A,
    /// Random-access row, positioned by `record_at`.
    B,
}

pub trait RecordSource {
    /// Value of `column` at the row the given slot is positioned on.
    fn value(&self, slot: Slot, column: usize) -> Value<'_>;

    /// Row id of the row the given slot is positioned on.
    fn row_id(&self, slot: Slot) -> RowId;
}

/// Dictionary of a symbol column.
pub trait SymbolTable {
    fn value_of(&self, key: i32) -> Option<&str>;
    fn size(&self) -> usize;
}

#[derive(Clone, Copy)]
pub struct Record<'a> {
    source: &'a dyn RecordSource,
    slot: Slot,
}

impl<'a> Record<'a> {
    pub fn new(source: &'a dyn RecordSource, slot: Slot) -> Self {
        Self { source, slot }
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn value(&self, column: usize) -> Value<'a> {
        self.source.value(self.slot, column)
    }

    pub fn row_id(&self) -> RowId {
        self.source.row_id(self.slot)
    }

    pub fn get_bool(&self, column: usize) -> bool {
        matches!(self.value(column), Value::Bool(true))
    }

    pub fn get_int(&self, column: usize) -> i32 {
        match self.value(column) {
            Value::Int(v) => v,
            _ => NULL_INT,
        }
    }

    /// Widens INT; reads TIMESTAMP as its raw micros.
    pub fn get_long(&self, column: usize) -> i64 {
        match self.value(column) {
            Value::Int(v) if v != NULL_INT => v as i64,
            Value::Long(v) | Value::Timestamp(v) => v,
            _ => NULL_LONG,
        }
    }

    pub fn get_double(&self, column: usize) -> f64 {
        match self.value(column) {
            Value::Double(v) => v,
            Value::Int(v) if v != NULL_INT => v as f64,
            Value::Long(v) if v != NULL_LONG => v as f64,
            _ => f64::NAN,
        }
    }

    /// Text of a STRING or SYMBOL column.
    pub fn get_str(&self, column: usize) -> Option<&'a str> {
        match self.value(column) {
            Value::Str(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_symbol(&self, column: usize) -> Option<&'a str> {
        match self.value(column) {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn get_bin(&self, column: usize) -> Option<&'a [u8]> {
        match self.value(column) {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    /// Timestamp in epoch micros.
    ///
    /// Text values are parsed as partial dates; malformed text is
    /// `Error::InvalidInput`. Null reads as `NULL_TIMESTAMP`.
    pub fn get_timestamp(&self, column: usize) -> Result<i64> {
        match self.value(column) {
            Value::Timestamp(v) | Value::Long(v) => Ok(v),
            Value::Null => Ok(NULL_TIMESTAMP),
            Value::Str(s) => parse_floor_partial(s),
            other => Err(Error::InvalidInput(format!(
                "column {column} holds {other:?}, not a timestamp"
            ))),
        }
    }
}

impl fmt::Debug for Record<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("slot", &self.slot)
            .field("row_id", &self.row_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(Vec<Value<'static>>);

    impl RecordSource for Row {
        fn value(&self, _slot: Slot, column: usize) -> Value<'_> {
            self.0.get(column).copied().unwrap_or(Value::Null)
        }

        fn row_id(&self, _slot: Slot) -> RowId {
            RowId::new(42)
        }
    }

    #[test]
    fn typed_accessors_widen_and_default_to_null() {
        let row = Row(vec![
            Value::Int(7),
            Value::Null,
            Value::Symbol("BTC"),
            Value::Str("2020-01-01"),
        ]);
        let rec = Record::new(&row, Slot::A);
        assert_eq!(rec.get_long(0), 7);
        assert_eq!(rec.get_double(0), 7.0);
        assert_eq!(rec.get_long(1), NULL_LONG);
        assert!(rec.get_double(1).is_nan());
        assert_eq!(rec.get_str(2), Some("BTC"));
        assert_eq!(rec.get_symbol(3), None);
        assert_eq!(rec.row_id(), RowId::new(42));
    }

    #[test]
    fn timestamp_from_text_and_garbage() {
        let row = Row(vec![
            Value::Str("1970-01-01T00:00:01"),
            Value::Str("yesterday"),
            Value::Bool(true),
        ]);
        let rec = Record::new(&row, Slot::A);
        assert_eq!(rec.get_timestamp(0).unwrap(), 1_000_000);
        assert!(matches!(rec.get_timestamp(1), Err(Error::InvalidInput(_))));
        assert!(matches!(rec.get_timestamp(2), Err(Error::InvalidInput(_))));
        assert_eq!(rec.get_timestamp(9).unwrap(), NULL_TIMESTAMP);
    }
}
