//! The statement tree produced by [`crate::sql::parser::parse`] and consumed
//! by [`crate::exec::SQLExec`].

use crate::value::DataType;

pub type Identifier = String;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Text(String),
}

/// A WHERE-clause expression. Only conjunctions of column-equals-literal
/// comparisons are supported; anything else parses fine but is rejected at
/// execution time with `ExecError::Unsupported`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Equals {
        table: Option<Identifier>,
        column: Identifier,
        value: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Other(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        table: Identifier,
        columns: Vec<(Identifier, DataType)>,
    },
    CreateIndex {
        table: Identifier,
        index: Identifier,
        columns: Vec<Identifier>,
    },
    DropTable {
        table: Identifier,
    },
    DropIndex {
        table: Identifier,
        index: Identifier,
    },
    ShowTables,
    ShowColumns {
        table: Identifier,
    },
    ShowIndex {
        table: Identifier,
    },
    Insert {
        table: Identifier,
        columns: Option<Vec<Identifier>>,
        values: Vec<Literal>,
    },
    Delete {
        table: Identifier,
        where_clause: Option<Expr>,
    },
    Select {
        table: Identifier,
        columns: Option<Vec<Identifier>>,
        where_clause: Option<Expr>,
    },
}
