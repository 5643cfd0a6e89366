//! Record sinks: compiled record-to-key projections.
//!
//! A sink is built once from record metadata and a column filter. `copy`
//! writes the selected columns, in filter order, into a map key. Two records
//! whose selected columns are equal produce identical key bytes, which is all
//! the map needs for hashing and equality.
//!
//! Symbols are written as their text, so keys built from cursors with
//! different dictionaries still compare equal.

use serde::{Deserialize, Serialize};

use cadence_core::prelude::{DataType, Record, RecordMetadata};
use cadence_mem::map::MapKey;

use crate::traits::OpError;

/// Which columns take part in a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnFilter {
    /// Every column, in schema order.
    #[default]
    All,
    /// Explicit column indexes, written in the order given.
    Columns(Vec<usize>),
}

impl ColumnFilter {
    pub fn columns(columns: impl IntoIterator<Item = usize>) -> Self {
        ColumnFilter::Columns(columns.into_iter().collect())
    }

    pub fn resolve(&self, metadata: &RecordMetadata) -> Result<Vec<usize>, OpError> {
        let count = metadata.column_count();
        match self {
            ColumnFilter::All => Ok((0..count).collect()),
            ColumnFilter::Columns(cols) => {
                if let Some(bad) = cols.iter().find(|&&c| c >= count) {
                    return Err(OpError::Plan(format!(
                        "key column {bad} is out of range ({count} columns)"
                    )));
                }
                Ok(cols.clone())
            }
        }
    }
}

/// Byte layout a column is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Bool,
    Int,
    Long,
    Double,
    Timestamp,
    Str,
    Bin,
}

impl KeyKind {
    pub fn of(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => KeyKind::Bool,
            DataType::Int32 => KeyKind::Int,
            DataType::Int64 => KeyKind::Long,
            DataType::Float64 => KeyKind::Double,
            DataType::Timestamp => KeyKind::Timestamp,
            DataType::Symbol | DataType::Utf8 => KeyKind::Str,
            DataType::Binary => KeyKind::Bin,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordSink {
    plan: Vec<(usize, KeyKind)>,
}

impl RecordSink {
    pub fn new(metadata: &RecordMetadata, filter: &ColumnFilter) -> Result<Self, OpError> {
        let plan = filter
            .resolve(metadata)?
            .into_iter()
            .filter_map(|col| metadata.column_type(col).map(|t| (col, KeyKind::of(t))))
            .collect();
        Ok(Self { plan })
    }

    /// Layout of the key this sink writes, in order.
    pub fn key_kinds(&self) -> impl Iterator<Item = KeyKind> + '_ {
        self.plan.iter().map(|&(_, kind)| kind)
    }

    pub fn column_count(&self) -> usize {
        self.plan.len()
    }

    /// Append the selected columns of `record` to `key`.
    ///
    /// Fails only when a timestamp column holds text that does not parse.
    pub fn copy(&self, record: &Record<'_>, key: &mut MapKey<'_>) -> Result<(), OpError> {
        for &(col, kind) in &self.plan {
            match kind {
                KeyKind::Bool => key.put_bool(record.get_bool(col)),
                KeyKind::Int => key.put_int(record.get_int(col)),
                KeyKind::Long => key.put_long(record.get_long(col)),
                KeyKind::Double => key.put_double(record.get_double(col)),
                KeyKind::Timestamp => key.put_timestamp(record.get_timestamp(col)?),
                KeyKind::Str => key.put_str(record.get_str(col)),
                KeyKind::Bin => key.put_bin(record.get_bin(col)),
            }
        }
        Ok(())
    }
}
