//! Logical schema and record metadata. Pure data; no storage dependency here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float64,
    /// Microseconds since the Unix epoch.
    Timestamp,
    /// Dictionary-encoded string; values resolve through a symbol table.
    Symbol,
    Utf8,
    Binary,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INT",
            DataType::Int64 => "LONG",
            DataType::Float64 => "DOUBLE",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Symbol => "SYMBOL",
            DataType::Utf8 => "STRING",
            DataType::Binary => "BINARY",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Field> {
        self.fields.get(idx)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Schema plus the facts operators need about ordering: which column (if any)
/// is the designated timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub schema: Schema,
    pub timestamp_index: Option<usize>,
}

impl RecordMetadata {
    pub fn new(schema: Schema, timestamp_index: Option<usize>) -> Result<Self> {
        if let Some(idx) = timestamp_index {
            let field = schema.field(idx).ok_or_else(|| {
                Error::Schema(format!("timestamp index {idx} is out of range"))
            })?;
            if !matches!(
                field.data_type,
                DataType::Timestamp | DataType::Int64 | DataType::Utf8
            ) {
                return Err(Error::Schema(format!(
                    "column '{}' of type {} cannot be the designated timestamp",
                    field.name,
                    field.data_type.name()
                )));
            }
        }
        Ok(Self {
            schema,
            timestamp_index,
        })
    }

    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    pub fn column_type(&self, idx: usize) -> Option<DataType> {
        self.schema.field(idx).map(|f| f.data_type)
    }

    pub fn column_name(&self, idx: usize) -> Option<&str> {
        self.schema.field(idx).map(|f| f.name.as_str())
    }

    /// Metadata of a join: master columns followed by slave columns.
    ///
    /// Slave names that collide with a master name get a `_right` suffix. The
    /// timestamp stays the master's; slave columns are nullable because an
    /// unmatched master row has no slave side.
    pub fn join(master: &RecordMetadata, slave: &RecordMetadata) -> RecordMetadata {
        let mut fields = master.schema.fields.clone();
        for field in &slave.schema.fields {
            let mut new_field = field.clone();
            if master.schema.index_of(&field.name).is_some() {
                new_field.name = format!("{}_right", field.name);
            }
            new_field.nullable = true;
            fields.push(new_field);
        }
        RecordMetadata {
            schema: Schema::new(fields),
            timestamp_index: master.timestamp_index,
        }
    }
}
