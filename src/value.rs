//! Tagged row values and column metadata.

use std::collections::HashMap;

/// The data type of a column. `Bool` exists only for internal catalog rows
/// (e.g. `_indices.is_unique`); user tables are restricted to `Int`/`Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Text,
    Bool,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataType::Int => "INT",
            DataType::Text => "TEXT",
            DataType::Bool => "BOOL",
        };
        write!(f, "{}", s)
    }
}

/// A single tagged value stored in a row or used as a B-tree key component.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Int(i32),
    Text(String),
    Bool(bool),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
            Value::Bool(_) => DataType::Bool,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Column metadata: just the data type, per the spec. Column order lives in
/// the owning schema's column-name vector, not here.
#[derive(Debug, Clone, Copy)]
pub struct ColumnAttribute {
    pub data_type: DataType,
}

impl ColumnAttribute {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type }
    }
}

/// An ordered (name, data_type) column declaration, as produced by
/// `CREATE TABLE` and as stored (per-row) in `_columns`.
pub type ColumnDef = (String, DataType);

/// A single row: an unordered mapping from column name to value. Marshalling
/// order comes from the owning table's schema, not from this map.
pub type Row = HashMap<String, Value>;
