//! Column values as operators see them.
//!
//! `Value` borrows from whatever storage backs the current record and is cheap
//! to pass around in hot loops. `Scalar` is the owned counterpart used to build
//! in-memory tables and to snapshot rows in tests.

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

/// Null sentinel for INT columns.
pub const NULL_INT: i32 = i32::MIN;
/// Null sentinel for LONG columns.
pub const NULL_LONG: i64 = i64::MIN;
/// Null sentinel for TIMESTAMP columns.
pub const NULL_TIMESTAMP: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Timestamp(i64),
    /// Already resolved through the owning cursor's symbol table.
    Symbol(&'a str),
    Str(&'a str),
    Bin(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Owned snapshot of this value. Symbols come back as plain strings.
    pub fn to_scalar(&self) -> Scalar {
        match *self {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Int(v) => Scalar::I32(v),
            Value::Long(v) => Scalar::I64(v),
            Value::Double(v) => Scalar::F64(v),
            Value::Timestamp(v) => Scalar::Ts(v),
            Value::Symbol(s) | Value::Str(s) => Scalar::Str(s.to_string()),
            Value::Bin(b) => Scalar::Bin(b.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    Ts(i64),
    Str(String),
    Bin(Vec<u8>),
    /// Key into a column's symbol table.
    Sym(i32),
}

impl Scalar {
    /// Whether a value of this shape may be stored in a column of `data_type`.
    pub fn fits(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (Scalar::Null, _)
                | (Scalar::Bool(_), DataType::Boolean)
                | (Scalar::I32(_), DataType::Int32)
                | (Scalar::I64(_), DataType::Int64)
                | (Scalar::F64(_), DataType::Float64)
                | (Scalar::Ts(_), DataType::Timestamp)
                | (Scalar::Str(_), DataType::Utf8)
                | (Scalar::Str(_), DataType::Symbol)
                | (Scalar::Sym(_), DataType::Symbol)
                | (Scalar::Bin(_), DataType::Binary)
        )
    }

    /// Borrow as a `Value`. Symbol keys need a symbol table to resolve, so they
    /// are handled by the caller; here they read as null.
    pub fn as_value(&self) -> Value<'_> {
        match self {
            Scalar::Null | Scalar::Sym(_) => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::I32(v) => Value::Int(*v),
            Scalar::I64(v) => Value::Long(*v),
            Scalar::F64(v) => Value::Double(*v),
            Scalar::Ts(v) => Value::Timestamp(*v),
            Scalar::Str(s) => Value::Str(s),
            Scalar::Bin(b) => Value::Bin(b),
        }
    }
}
