//! Statement dispatch: `SQLExec::execute` turns one parsed [`Statement`]
//! into catalog/relation/index mutations and a [`QueryResult`].

pub mod where_clause;

use std::rc::Rc;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::constants::{is_schema_table, Handle};
use crate::error::{ExecError, RelationError};
use crate::plan::EvalPlan;
use crate::sql::ast::{Expr, Literal, Statement};
use crate::storage::heap_table::HeapTable;
use crate::value::{DataType, Row, Value};

/// The result of one executed statement: a human-readable message, plus
/// tabular data for statements that return rows (SHOW/SELECT).
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub message: String,
    pub column_names: Option<Vec<String>>,
    pub rows: Option<Vec<Row>>,
}

impl QueryResult {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            column_names: None,
            rows: None,
        }
    }

    pub fn with_rows(message: impl Into<String>, column_names: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            message: message.into(),
            column_names: Some(column_names),
            rows: Some(rows),
        }
    }
}

fn literal_to_value(column: &str, literal: &Literal, expected: DataType) -> Result<Value, ExecError> {
    match (literal, expected) {
        (Literal::Int(i), DataType::Int) => Ok(Value::Int(*i)),
        (Literal::Text(s), DataType::Text) => Ok(Value::Text(s.clone())),
        (literal, expected) => Err(ExecError::Relation(RelationError::TypeMismatch {
            column: column.to_string(),
            expected,
            actual: match literal {
                Literal::Int(_) => DataType::Int,
                Literal::Text(_) => DataType::Text,
            },
        })),
    }
}

/// Dispatches parsed statements against one [`Catalog`].
pub struct SQLExec<'a> {
    catalog: &'a Catalog,
}

impl<'a> SQLExec<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn execute(&self, statement: &Statement) -> Result<QueryResult, ExecError> {
        match statement {
            Statement::CreateTable { table, columns } => self.create_table(table, columns),
            Statement::CreateIndex {
                table,
                index,
                columns,
            } => self.create_index(table, index, columns),
            Statement::DropTable { table } => self.drop_table(table),
            Statement::DropIndex { table, index } => self.drop_index(table, index),
            Statement::ShowTables => self.show_tables(),
            Statement::ShowColumns { table } => self.show_columns(table),
            Statement::ShowIndex { table } => self.show_index(table),
            Statement::Insert {
                table,
                columns,
                values,
            } => self.insert(table, columns.as_deref(), values),
            Statement::Delete { table, where_clause } => self.delete(table, where_clause.as_ref()),
            Statement::Select {
                table,
                columns,
                where_clause,
            } => self.select(table, columns.as_deref(), where_clause.as_ref()),
        }
    }

    fn table_exists(&self, name: &str) -> Result<bool, ExecError> {
        Ok(!self.catalog.get_columns(name)?.is_empty())
    }

    fn rollback_handles(&self, handles: &[Handle], delete: impl Fn(&Catalog, Handle) -> Result<(), RelationError>) {
        for &handle in handles {
            if let Err(e) = delete(self.catalog, handle) {
                warn!(error = %e, "failed to roll back catalog row");
            }
        }
    }

    fn create_table(
        &self,
        table: &str,
        columns: &[(String, DataType)],
    ) -> Result<QueryResult, ExecError> {
        if self.table_exists(table)? {
            return Err(ExecError::DuplicateTable(table.to_string()));
        }
        let table_handle = self.catalog.register_table(table)?;
        let mut column_handles = Vec::new();
        for (name, data_type) in columns {
            match self.catalog.register_column(table, name, *data_type) {
                Ok(h) => column_handles.push(h),
                Err(e) => {
                    self.rollback_handles(&column_handles, Catalog::delete_column_row);
                    let _ = self.catalog.delete_table_row(table_handle);
                    return Err(e.into());
                }
            }
        }
        match HeapTable::create_if_not_exists(self.catalog.dir(), table, columns.to_vec()) {
            Ok(_) => {
                info!(table, "created table");
                Ok(QueryResult::message(format!("created {table}")))
            }
            Err(e) => {
                self.rollback_handles(&column_handles, Catalog::delete_column_row);
                let _ = self.catalog.delete_table_row(table_handle);
                Err(e.into())
            }
        }
    }

    fn create_index(
        &self,
        table: &str,
        index: &str,
        columns: &[String],
    ) -> Result<QueryResult, ExecError> {
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }
        let mut index_handles = Vec::new();
        for (i, column) in columns.iter().enumerate() {
            match self
                .catalog
                .register_index_column(table, index, (i + 1) as i32, column, "BTREE", true)
            {
                Ok(h) => index_handles.push(h),
                Err(e) => {
                    self.rollback_handles(&index_handles, Catalog::delete_index_row);
                    return Err(e.into());
                }
            }
        }

        let index_obj = self.catalog.get_index(table, index)?;
        let relation = self.catalog.get_table(table)?;
        let created = {
            let mut index_obj = index_obj.borrow_mut();
            let mut relation = relation.borrow_mut();
            index_obj.create(&mut relation)
        };
        match created {
            Ok(()) => {
                info!(table, index, "created index");
                Ok(QueryResult::message(format!("created index {index}")))
            }
            Err(e) => {
                self.rollback_handles(&index_handles, Catalog::delete_index_row);
                self.catalog.forget_index(table, index);
                Err(e.into())
            }
        }
    }

    fn drop_table(&self, table: &str) -> Result<QueryResult, ExecError> {
        if is_schema_table(table) {
            return Err(ExecError::SchemaTableProtected);
        }
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }

        for index_name in self.catalog.get_index_names(table)? {
            let index_obj = self.catalog.get_index(table, &index_name)?;
            for handle in self.catalog.index_handles(table, &index_name)? {
                self.catalog.delete_index_row(handle)?;
            }
            self.catalog.forget_index(table, &index_name);
            match Rc::try_unwrap(index_obj) {
                Ok(cell) => cell.into_inner().drop_index()?,
                Err(_) => warn!(table, index = %index_name, "index object still referenced, leaving file on disk"),
            }
        }

        for handle in self.catalog.column_handles(table)? {
            self.catalog.delete_column_row(handle)?;
        }

        let relation = self.catalog.get_table(table)?;
        self.catalog.forget_table(table);
        match Rc::try_unwrap(relation) {
            Ok(cell) => cell.into_inner().drop_table()?,
            Err(_) => warn!(table, "table object still referenced, leaving file on disk"),
        }

        if let Some(handle) = self.catalog.table_row_handle(table)? {
            self.catalog.delete_table_row(handle)?;
        }

        info!(table, "dropped table");
        Ok(QueryResult::message(format!("dropped {table}")))
    }

    fn drop_index(&self, table: &str, index: &str) -> Result<QueryResult, ExecError> {
        let handles = self.catalog.index_handles(table, index)?;
        if handles.is_empty() {
            return Err(ExecError::NoSuchIndex(index.to_string(), table.to_string()));
        }
        let index_obj = self.catalog.get_index(table, index)?;
        for handle in handles {
            self.catalog.delete_index_row(handle)?;
        }
        self.catalog.forget_index(table, index);
        match Rc::try_unwrap(index_obj) {
            Ok(cell) => cell.into_inner().drop_index()?,
            Err(_) => warn!(table, index, "index object still referenced, leaving file on disk"),
        }
        info!(table, index, "dropped index");
        Ok(QueryResult::message(format!("dropped index {index}")))
    }

    fn show_tables(&self) -> Result<QueryResult, ExecError> {
        let rows: Vec<Row> = self
            .catalog
            .table_names()?
            .into_iter()
            .filter(|name| !is_schema_table(name))
            .map(|name| Row::from([("table_name".to_string(), Value::Text(name))]))
            .collect();
        Ok(QueryResult::with_rows(
            format!("successfully returned {} rows", rows.len()),
            vec!["table_name".to_string()],
            rows,
        ))
    }

    fn show_columns(&self, table: &str) -> Result<QueryResult, ExecError> {
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }
        let rows: Vec<Row> = self
            .catalog
            .get_columns(table)?
            .into_iter()
            .map(|(name, data_type)| {
                Row::from([
                    ("column_name".to_string(), Value::Text(name)),
                    ("data_type".to_string(), Value::Text(data_type.to_string())),
                ])
            })
            .collect();
        Ok(QueryResult::with_rows(
            format!("successfully returned {} rows", rows.len()),
            vec!["column_name".to_string(), "data_type".to_string()],
            rows,
        ))
    }

    fn show_index(&self, table: &str) -> Result<QueryResult, ExecError> {
        let rows = self.catalog.index_rows(table)?;
        Ok(QueryResult::with_rows(
            format!("successfully returned {} rows", rows.len()),
            vec![
                "table_name".to_string(),
                "index_name".to_string(),
                "seq_in_index".to_string(),
                "column_name".to_string(),
                "index_type".to_string(),
                "is_unique".to_string(),
            ],
            rows,
        ))
    }

    fn insert(
        &self,
        table: &str,
        columns: Option<&[String]>,
        values: &[Literal],
    ) -> Result<QueryResult, ExecError> {
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }
        let schema = self.catalog.get_columns(table)?;
        let target_columns: Vec<String> = match columns {
            Some(cols) => cols.to_vec(),
            None => schema.iter().map(|(name, _)| name.clone()).collect(),
        };
        if target_columns.len() != values.len() {
            return Err(ExecError::unsupported(format!(
                "expected {} values, got {}",
                target_columns.len(),
                values.len()
            )));
        }

        let mut row = Row::new();
        for (name, literal) in target_columns.iter().zip(values.iter()) {
            let data_type = schema
                .iter()
                .find(|(col, _)| col == name)
                .map(|(_, dt)| *dt)
                .ok_or_else(|| ExecError::Relation(RelationError::UnknownColumn(name.clone())))?;
            row.insert(name.clone(), literal_to_value(name, literal, data_type)?);
        }

        let relation = self.catalog.get_table(table)?;
        let handle = relation.borrow_mut().insert(&row)?;

        for index_name in self.catalog.get_index_names(table)? {
            let index = self.catalog.get_index(table, &index_name)?;
            let mut relation_mut = relation.borrow_mut();
            index.borrow_mut().insert(handle, &mut relation_mut)?;
        }

        Ok(QueryResult::message(format!("inserted 1 row into {table}")))
    }

    fn delete(&self, table: &str, where_clause: Option<&Expr>) -> Result<QueryResult, ExecError> {
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }
        let relation = self.catalog.get_table(table)?;
        let mut plan = EvalPlan::table_scan(table, relation.clone());
        if let Some(expr) = where_clause {
            plan = EvalPlan::select(where_clause::flatten(expr, table)?, plan);
        }
        let plan = plan.optimize(self.catalog);
        let (relation, handles) = plan.pipeline()?;

        let index_names = self.catalog.get_index_names(table)?;
        let mut deleted = 0usize;
        for handle in handles {
            for index_name in &index_names {
                let index = self.catalog.get_index(table, index_name)?;
                index.borrow_mut().del(handle)?;
            }
            relation.borrow_mut().del(handle)?;
            deleted += 1;
        }
        Ok(QueryResult::message(format!(
            "successfully deleted {deleted} rows from {table} and {} indices",
            index_names.len()
        )))
    }

    fn select(
        &self,
        table: &str,
        columns: Option<&[String]>,
        where_clause: Option<&Expr>,
    ) -> Result<QueryResult, ExecError> {
        if !self.table_exists(table)? {
            return Err(ExecError::NoSuchTable(table.to_string()));
        }
        let relation = self.catalog.get_table(table)?;
        let mut plan = EvalPlan::table_scan(table, relation);
        if let Some(expr) = where_clause {
            plan = EvalPlan::select(where_clause::flatten(expr, table)?, plan);
        }
        if let Some(cols) = columns {
            plan = EvalPlan::project(cols.to_vec(), plan);
        }
        let plan = plan.optimize(self.catalog);
        let rows = plan.evaluate()?;

        let column_names = match columns {
            Some(cols) => cols.to_vec(),
            None => self
                .catalog
                .get_columns(table)?
                .into_iter()
                .map(|(name, _)| name)
                .collect(),
        };
        Ok(QueryResult::with_rows(
            format!("successfully returned {} rows", rows.len()),
            column_names,
            rows,
        ))
    }
}
