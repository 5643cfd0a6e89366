//! Per-column casts that let two inputs with different but compatible column
//! types be compared as one shape.

use cadence_core::error::{self, Error};
use cadence_core::prelude::{
    DataType, Field, RecordMetadata, RecordSource, RowId, Schema, Slot, Value, NULL_INT,
    NULL_LONG,
};
use cadence_core::timestamp::parse_floor_partial;

use crate::traits::OpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastFn {
    Identity,
    IntToLong,
    IntToDouble,
    LongToDouble,
    LongToTimestamp,
    SymbolToStr,
    StrToTimestamp,
}

/// Common type two columns are compared as, if there is one.
pub fn unify_type(a: DataType, b: DataType) -> Option<DataType> {
    use DataType::*;
    if a == b {
        return Some(a);
    }
    match (a, b) {
        (Int32, Int64) | (Int64, Int32) => Some(Int64),
        (Int32 | Int64, Float64) | (Float64, Int32 | Int64) => Some(Float64),
        (Int64, Timestamp) | (Timestamp, Int64) => Some(Timestamp),
        (Symbol, Utf8) | (Utf8, Symbol) => Some(Utf8),
        (Utf8, Timestamp) | (Timestamp, Utf8) => Some(Timestamp),
        _ => None,
    }
}

impl CastFn {
    /// Cast converting values of type `from` into type `to`.
    pub fn unify(from: DataType, to: DataType) -> Option<CastFn> {
        use DataType::*;
        match (from, to) {
            _ if from == to => Some(CastFn::Identity),
            (Int32, Int64) => Some(CastFn::IntToLong),
            (Int32, Float64) => Some(CastFn::IntToDouble),
            (Int64, Float64) => Some(CastFn::LongToDouble),
            (Int64, Timestamp) => Some(CastFn::LongToTimestamp),
            (Symbol, Utf8) => Some(CastFn::SymbolToStr),
            (Utf8, Timestamp) => Some(CastFn::StrToTimestamp),
            _ => None,
        }
    }

    /// Only text-to-timestamp can fail.
    pub fn is_fallible(self) -> bool {
        self == CastFn::StrToTimestamp
    }

    pub fn apply<'v>(self, value: Value<'v>) -> error::Result<Value<'v>> {
        Ok(match (self, value) {
            (CastFn::Identity, v) => v,
            (CastFn::IntToLong, Value::Int(v)) if v == NULL_INT => Value::Long(NULL_LONG),
            (CastFn::IntToLong, Value::Int(v)) => Value::Long(v as i64),
            (CastFn::IntToDouble, Value::Int(v)) if v == NULL_INT => Value::Double(f64::NAN),
            (CastFn::IntToDouble, Value::Int(v)) => Value::Double(v as f64),
            (CastFn::LongToDouble, Value::Long(v)) if v == NULL_LONG => Value::Double(f64::NAN),
            (CastFn::LongToDouble, Value::Long(v)) => Value::Double(v as f64),
            (CastFn::LongToTimestamp, Value::Long(v)) => Value::Timestamp(v),
            (CastFn::SymbolToStr, Value::Symbol(s)) => Value::Str(s),
            (CastFn::StrToTimestamp, Value::Str(s)) => Value::Timestamp(parse_floor_partial(s)?),
            (_, Value::Null) => Value::Null,
            (cast, other) => {
                return Err(Error::InvalidInput(format!(
                    "{cast:?} cannot convert {other:?}"
                )))
            }
        })
    }
}

/// Unified output shape of two inputs plus the casts taking each side to it.
#[derive(Debug, Clone)]
pub struct UnifiedMetadata {
    pub metadata: RecordMetadata,
    pub casts_a: Vec<CastFn>,
    pub casts_b: Vec<CastFn>,
}

/// Column names and designated timestamp come from side A.
pub fn unify_metadata(a: &RecordMetadata, b: &RecordMetadata) -> Result<UnifiedMetadata, OpError> {
    if a.column_count() != b.column_count() {
        return Err(OpError::Schema(format!(
            "set operation inputs have {} and {} columns",
            a.column_count(),
            b.column_count()
        )));
    }

    let mut fields = Vec::with_capacity(a.column_count());
    let mut casts_a = Vec::with_capacity(a.column_count());
    let mut casts_b = Vec::with_capacity(a.column_count());
    for (fa, fb) in a.schema.fields.iter().zip(&b.schema.fields) {
        let incompatible = || {
            OpError::Schema(format!(
                "column '{}' cannot unify {} with {}",
                fa.name,
                fa.data_type.name(),
                fb.data_type.name()
            ))
        };
        let to = unify_type(fa.data_type, fb.data_type).ok_or_else(incompatible)?;
        casts_a.push(CastFn::unify(fa.data_type, to).ok_or_else(incompatible)?);
        casts_b.push(CastFn::unify(fb.data_type, to).ok_or_else(incompatible)?);
        fields.push(Field::new(fa.name.clone(), to, fa.nullable || fb.nullable));
    }

    let timestamp_index = a
        .timestamp_index
        .filter(|&i| fields[i].data_type == DataType::Timestamp);
    Ok(UnifiedMetadata {
        metadata: RecordMetadata::new(Schema::new(fields), timestamp_index)?,
        casts_a,
        casts_b,
    })
}

/// Record source presenting another source's columns through casts.
pub struct CastView<'v, S: ?Sized> {
    source: &'v S,
    casts: &'v [CastFn],
}

impl<'v, S: RecordSource + ?Sized> CastView<'v, S> {
    pub fn new(source: &'v S, casts: &'v [CastFn]) -> Self {
        Self { source, casts }
    }

    /// Run the fallible casts on the row at `slot`. A row that passes reads
    /// without loss through `value`.
    pub fn check(&self, slot: Slot) -> error::Result<()> {
        for (col, cast) in self.casts.iter().enumerate() {
            if cast.is_fallible() {
                cast.apply(self.source.value(slot, col))?;
            }
        }
        Ok(())
    }
}

impl<S: RecordSource + ?Sized> RecordSource for CastView<'_, S> {
    fn value(&self, slot: Slot, column: usize) -> Value<'_> {
        cast_value(self.casts, self.source.value(slot, column), column)
    }

    fn row_id(&self, slot: Slot) -> RowId {
        self.source.row_id(slot)
    }
}

/// Value through the column's cast; a value that fails to convert reads as null.
pub(crate) fn cast_value<'v>(casts: &[CastFn], value: Value<'v>, column: usize) -> Value<'v> {
    match casts.get(column) {
        Some(cast) => cast.apply(value).unwrap_or(Value::Null),
        None => value,
    }
}
