//! Layered error types. Each layer owns one `thiserror` enum and converts the
//! layer below via `#[from]`, matching the propagation rules in the spec:
//! page faults bubble into relation faults, which `SQLExec` rewraps with a
//! `DbRelationError:` prefix for user display.

use thiserror::Error;

use crate::value::DataType;

/// Faults raised by [`crate::storage::slotted_page::SlottedPage`].
#[derive(Debug, Error)]
pub enum PageError {
    #[error("no room for record of {size} bytes")]
    NoRoom { size: usize },

    #[error("record slot {0} not found")]
    SlotNotFound(crate::constants::RecordId),
}

/// Faults raised by the storage/catalog/btree layers.
#[derive(Debug, Error)]
pub enum RelationError {
    #[error("no room: {0}")]
    NoRoom(#[from] PageError),

    #[error("type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("unknown table {0}")]
    UnknownTable(String),

    #[error("unknown index {0} on table {1}")]
    UnknownIndex(String, String),

    #[error("no record at handle {0}")]
    RecordNotFound(crate::constants::Handle),

    #[error("duplicate key in unique index")]
    DuplicateKey,

    #[error("index must be unique")]
    NotUnique,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// User-visible executor failures.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("DbRelationError: {0}")]
    Relation(#[from] RelationError),

    #[error("table {0} already exists")]
    DuplicateTable(String),

    #[error("table {0} does not exist")]
    NoSuchTable(String),

    #[error("index {0} does not exist on table {1}")]
    NoSuchIndex(String, String),

    #[error("Can't drop a schema table")]
    SchemaTableProtected,

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("only INT/STRING literals supported")]
    UnsupportedLiteral,

    #[error("only `=` supported")]
    UnsupportedComparison,

    #[error("unknown table in WHERE: {0}")]
    UnknownTableInWhere(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("not implemented: {0}")]
    Unimplemented(&'static str),
}

impl ExecError {
    pub fn unsupported(msg: impl Into<String>) -> Self {
        ExecError::Unsupported(msg.into())
    }
}
