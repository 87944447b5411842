//! Self-describing catalog: the three reserved schema tables (`_tables`,
//! `_columns`, `_indices`) plus the process-lifetime cache of opened table
//! and index objects that makes repeated lookups return the same instance.
//!
//! Catalog cycles (the schema tables describe themselves) are broken at
//! bootstrap: the cache is seeded directly with the three schema relations
//! before any row is read back out of `_columns`, so `get_table("_tables")`
//! never needs to consult its own column list.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use crate::btree::BTreeIndex;
use crate::constants::{is_schema_table, Handle, COLUMNS_TABLE, INDICES_TABLE, TABLES_TABLE};
use crate::error::RelationError;
use crate::storage::heap_table::HeapTable;
use crate::value::{ColumnDef, DataType, Row, Value};

fn tables_schema() -> Vec<ColumnDef> {
    vec![("table_name".to_string(), DataType::Text)]
}

fn columns_schema() -> Vec<ColumnDef> {
    vec![
        ("table_name".to_string(), DataType::Text),
        ("column_name".to_string(), DataType::Text),
        ("data_type".to_string(), DataType::Text),
    ]
}

fn indices_schema() -> Vec<ColumnDef> {
    vec![
        ("table_name".to_string(), DataType::Text),
        ("index_name".to_string(), DataType::Text),
        ("seq_in_index".to_string(), DataType::Int),
        ("column_name".to_string(), DataType::Text),
        ("index_type".to_string(), DataType::Text),
        ("is_unique".to_string(), DataType::Bool),
    ]
}

fn data_type_name(dt: DataType) -> &'static str {
    match dt {
        DataType::Int => "INT",
        DataType::Text => "TEXT",
        DataType::Bool => "BOOL",
    }
}

fn data_type_from_name(name: &str) -> DataType {
    match name {
        "INT" => DataType::Int,
        "BOOL" => DataType::Bool,
        _ => DataType::Text,
    }
}

fn text_field(row: &Row, name: &str) -> String {
    match row.get(name) {
        Some(Value::Text(s)) => s.clone(),
        _ => String::new(),
    }
}

fn int_field(row: &Row, name: &str) -> i32 {
    match row.get(name) {
        Some(Value::Int(i)) => *i,
        _ => 0,
    }
}

fn bool_field(row: &Row, name: &str) -> bool {
    matches!(row.get(name), Some(Value::Bool(true)))
}

fn scan(rel: &Rc<RefCell<HeapTable>>) -> Result<Vec<(Handle, Row)>, RelationError> {
    let mut table = rel.borrow_mut();
    let handles = table.select(None)?;
    handles
        .into_iter()
        .map(|h| table.project(h, None).map(|row| (h, row)))
        .collect()
}

/// Rows of `rel` whose `field` equals `value`.
fn find_rows(
    rel: &Rc<RefCell<HeapTable>>,
    field: &str,
    value: &str,
) -> Result<Vec<(Handle, Row)>, RelationError> {
    Ok(scan(rel)?
        .into_iter()
        .filter(|(_, row)| text_field(row, field) == value)
        .collect())
}

/// The catalog: bootstrapped schema relations plus caches of every other
/// table/index object opened so far in this process.
pub struct Catalog {
    dir: PathBuf,
    tables_cache: RefCell<HashMap<String, Rc<RefCell<HeapTable>>>>,
    indices_cache: RefCell<HashMap<(String, String), Rc<RefCell<BTreeIndex>>>>,
}

impl Catalog {
    /// Open (creating if missing) the catalog rooted at `dir`, bootstrapping
    /// the three schema relations and their self-describing rows.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RelationError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let tables_rel = Rc::new(RefCell::new(HeapTable::create_if_not_exists(
            &dir,
            TABLES_TABLE,
            tables_schema(),
        )?));
        let columns_rel = Rc::new(RefCell::new(HeapTable::create_if_not_exists(
            &dir,
            COLUMNS_TABLE,
            columns_schema(),
        )?));
        let indices_rel = Rc::new(RefCell::new(HeapTable::create_if_not_exists(
            &dir,
            INDICES_TABLE,
            indices_schema(),
        )?));

        let mut cache = HashMap::new();
        cache.insert(TABLES_TABLE.to_string(), tables_rel.clone());
        cache.insert(COLUMNS_TABLE.to_string(), columns_rel.clone());
        cache.insert(INDICES_TABLE.to_string(), indices_rel.clone());

        let catalog = Self {
            dir,
            tables_cache: RefCell::new(cache),
            indices_cache: RefCell::new(HashMap::new()),
        };
        catalog.bootstrap_schema_rows()?;
        Ok(catalog)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bootstrap_schema_rows(&self) -> Result<(), RelationError> {
        let schemas: [(&str, Vec<ColumnDef>); 3] = [
            (TABLES_TABLE, tables_schema()),
            (COLUMNS_TABLE, columns_schema()),
            (INDICES_TABLE, indices_schema()),
        ];
        for (name, schema) in schemas {
            if find_rows(&self.tables_rel(), "table_name", name)?.is_empty() {
                debug!(table = name, "bootstrapping schema table row");
                self.tables_rel().borrow_mut().insert(&Row::from([(
                    "table_name".to_string(),
                    Value::Text(name.to_string()),
                )]))?;
            }
            for (col_name, data_type) in &schema {
                let existing = find_rows(&self.columns_rel(), "table_name", name)?
                    .into_iter()
                    .any(|(_, row)| text_field(&row, "column_name") == *col_name);
                if !existing {
                    self.columns_rel().borrow_mut().insert(&Row::from([
                        ("table_name".to_string(), Value::Text(name.to_string())),
                        ("column_name".to_string(), Value::Text(col_name.clone())),
                        (
                            "data_type".to_string(),
                            Value::Text(data_type_name(*data_type).to_string()),
                        ),
                    ]))?;
                }
            }
        }
        Ok(())
    }

    pub fn tables_rel(&self) -> Rc<RefCell<HeapTable>> {
        self.tables_cache.borrow()[TABLES_TABLE].clone()
    }

    pub fn columns_rel(&self) -> Rc<RefCell<HeapTable>> {
        self.tables_cache.borrow()[COLUMNS_TABLE].clone()
    }

    pub fn indices_rel(&self) -> Rc<RefCell<HeapTable>> {
        self.tables_cache.borrow()[INDICES_TABLE].clone()
    }

    /// Return the cached relation for `name`, opening it from `_columns` on
    /// first use.
    pub fn get_table(&self, name: &str) -> Result<Rc<RefCell<HeapTable>>, RelationError> {
        if let Some(table) = self.tables_cache.borrow().get(name) {
            return Ok(table.clone());
        }
        let columns = self.get_columns(name)?;
        if columns.is_empty() {
            return Err(RelationError::UnknownTable(name.to_string()));
        }
        let table = Rc::new(RefCell::new(HeapTable::open(&self.dir, name, columns)?));
        self.tables_cache
            .borrow_mut()
            .insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Column declarations for `name`, in the insertion order of their
    /// `_columns` handles.
    pub fn get_columns(&self, name: &str) -> Result<Vec<ColumnDef>, RelationError> {
        Ok(find_rows(&self.columns_rel(), "table_name", name)?
            .into_iter()
            .map(|(_, row)| {
                (
                    text_field(&row, "column_name"),
                    data_type_from_name(&text_field(&row, "data_type")),
                )
            })
            .collect())
    }

    /// Insert `name` into `_tables`, returning the new row's handle.
    pub fn register_table(&self, name: &str) -> Result<Handle, RelationError> {
        self.tables_rel().borrow_mut().insert(&Row::from([(
            "table_name".to_string(),
            Value::Text(name.to_string()),
        )]))
    }

    /// Insert one `_columns` row, returning its handle.
    pub fn register_column(
        &self,
        table: &str,
        column_name: &str,
        data_type: DataType,
    ) -> Result<Handle, RelationError> {
        self.columns_rel().borrow_mut().insert(&Row::from([
            ("table_name".to_string(), Value::Text(table.to_string())),
            (
                "column_name".to_string(),
                Value::Text(column_name.to_string()),
            ),
            (
                "data_type".to_string(),
                Value::Text(data_type_name(data_type).to_string()),
            ),
        ]))
    }

    pub fn delete_table_row(&self, handle: Handle) -> Result<(), RelationError> {
        self.tables_rel().borrow_mut().del(handle)
    }

    /// Every name currently recorded in `_tables`, including the three
    /// schema tables.
    pub fn table_names(&self) -> Result<Vec<String>, RelationError> {
        Ok(scan(&self.tables_rel())?
            .into_iter()
            .map(|(_, row)| text_field(&row, "table_name"))
            .collect())
    }

    /// The handle of `name`'s `_tables` row, if it has one.
    pub fn table_row_handle(&self, name: &str) -> Result<Option<Handle>, RelationError> {
        Ok(find_rows(&self.tables_rel(), "table_name", name)?
            .into_iter()
            .next()
            .map(|(h, _)| h))
    }

    /// Raw `_indices` rows for every index declared on `table`.
    pub fn index_rows(&self, table: &str) -> Result<Vec<Row>, RelationError> {
        Ok(find_rows(&self.indices_rel(), "table_name", table)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }

    pub fn delete_column_row(&self, handle: Handle) -> Result<(), RelationError> {
        self.columns_rel().borrow_mut().del(handle)
    }

    /// Handles of every `_columns` row belonging to `table`.
    pub fn column_handles(&self, table: &str) -> Result<Vec<Handle>, RelationError> {
        Ok(find_rows(&self.columns_rel(), "table_name", table)?
            .into_iter()
            .map(|(h, _)| h)
            .collect())
    }

    /// Drop `name` from the table cache (the underlying file is gone, or is
    /// about to be; callers must not look it up again without a fresh open).
    pub fn forget_table(&self, name: &str) {
        self.tables_cache.borrow_mut().remove(name);
    }

    /// Insert one `(table, index, seq_in_index, column, index_type, is_unique)`
    /// row into `_indices`, returning its handle.
    #[allow(clippy::too_many_arguments)]
    pub fn register_index_column(
        &self,
        table: &str,
        index: &str,
        seq_in_index: i32,
        column: &str,
        index_type: &str,
        is_unique: bool,
    ) -> Result<Handle, RelationError> {
        self.indices_rel().borrow_mut().insert(&Row::from([
            ("table_name".to_string(), Value::Text(table.to_string())),
            ("index_name".to_string(), Value::Text(index.to_string())),
            ("seq_in_index".to_string(), Value::Int(seq_in_index)),
            ("column_name".to_string(), Value::Text(column.to_string())),
            (
                "index_type".to_string(),
                Value::Text(index_type.to_string()),
            ),
            ("is_unique".to_string(), Value::Bool(is_unique)),
        ]))
    }

    pub fn delete_index_row(&self, handle: Handle) -> Result<(), RelationError> {
        self.indices_rel().borrow_mut().del(handle)
    }

    /// Handles of every `_indices` row for `(table, index)`.
    pub fn index_handles(&self, table: &str, index: &str) -> Result<Vec<Handle>, RelationError> {
        Ok(find_rows(&self.indices_rel(), "table_name", table)?
            .into_iter()
            .filter(|(_, row)| text_field(row, "index_name") == index)
            .map(|(h, _)| h)
            .collect())
    }

    /// Handles of every `_indices` row for `table`, across all its indices.
    pub fn index_handles_for_table(&self, table: &str) -> Result<Vec<Handle>, RelationError> {
        Ok(find_rows(&self.indices_rel(), "table_name", table)?
            .into_iter()
            .map(|(h, _)| h)
            .collect())
    }

    /// Distinct index names declared on `table`, in first-seen order.
    pub fn get_index_names(&self, table: &str) -> Result<Vec<String>, RelationError> {
        let mut names = Vec::new();
        for (_, row) in find_rows(&self.indices_rel(), "table_name", table)? {
            let name = text_field(&row, "index_name");
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Return the cached index object for `(table, index)`, constructing it
    /// from `_indices` rows on first use. The returned object may not yet
    /// have a backing file on disk; callers creating a brand-new index must
    /// still call [`BTreeIndex::create`] on it.
    pub fn get_index(
        &self,
        table: &str,
        index: &str,
    ) -> Result<Rc<RefCell<BTreeIndex>>, RelationError> {
        let key = (table.to_string(), index.to_string());
        if let Some(bt) = self.indices_cache.borrow().get(&key) {
            return Ok(bt.clone());
        }

        let mut rows = find_rows(&self.indices_rel(), "table_name", table)?
            .into_iter()
            .filter(|(_, row)| text_field(&row, "index_name") == index)
            .map(|(_, row)| row)
            .collect::<Vec<_>>();
        if rows.is_empty() {
            return Err(RelationError::UnknownIndex(
                index.to_string(),
                table.to_string(),
            ));
        }
        rows.sort_by_key(|row| int_field(row, "seq_in_index"));

        let key_columns: Vec<String> = rows.iter().map(|row| text_field(row, "column_name")).collect();
        let is_unique = bool_field(&rows[0], "is_unique");

        let table_rel = self.get_table(table)?;
        let key_profile: Vec<DataType> = key_columns
            .iter()
            .map(|col| {
                table_rel
                    .borrow()
                    .column_attribute(col)
                    .map(|attr| attr.data_type)
                    .ok_or_else(|| RelationError::UnknownColumn(col.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(table, index, "opening index object");
        let bt = Rc::new(RefCell::new(BTreeIndex::new(
            &self.dir,
            table,
            index,
            key_columns,
            key_profile,
            is_unique,
        )));
        self.indices_cache.borrow_mut().insert(key, bt.clone());
        Ok(bt)
    }

    /// Drop `(table, index)` from the index cache.
    pub fn forget_index(&self, table: &str, index: &str) {
        self.indices_cache
            .borrow_mut()
            .remove(&(table.to_string(), index.to_string()));
    }

    pub fn is_schema_table(name: &str) -> bool {
        is_schema_table(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn bootstrap_seeds_schema_rows_once() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let rows = find_rows(&catalog.tables_rel(), "table_name", TABLES_TABLE).unwrap();
        assert_eq!(rows.len(), 1);

        drop(catalog);
        let catalog = Catalog::open(dir.path()).unwrap();
        let rows = find_rows(&catalog.tables_rel(), "table_name", TABLES_TABLE).unwrap();
        assert_eq!(rows.len(), 1, "reopening must not duplicate bootstrap rows");
    }

    #[test]
    fn get_table_short_circuits_for_schema_tables() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let tables = catalog.get_table(TABLES_TABLE).unwrap();
        assert!(Rc::ptr_eq(&tables, &catalog.tables_rel()));
    }

    #[test]
    fn register_then_get_table_round_trips() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.register_table("students").unwrap();
        catalog
            .register_column("students", "id", DataType::Int)
            .unwrap();
        catalog
            .register_column("students", "name", DataType::Text)
            .unwrap();
        HeapTable::create(catalog.dir(), "students", catalog.get_columns("students").unwrap())
            .unwrap();

        let table = catalog.get_table("students").unwrap();
        assert_eq!(table.borrow().columns().len(), 2);
    }

    #[test]
    fn unknown_table_is_an_error() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        assert!(matches!(
            catalog.get_table("nope").unwrap_err(),
            RelationError::UnknownTable(_)
        ));
    }

    #[test]
    fn get_index_resolves_key_profile_from_table_columns() {
        let dir = tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        catalog.register_table("students").unwrap();
        catalog
            .register_column("students", "id", DataType::Int)
            .unwrap();
        HeapTable::create(catalog.dir(), "students", catalog.get_columns("students").unwrap())
            .unwrap();

        catalog
            .register_index_column("students", "idx_id", 1, "id", "BTREE", true)
            .unwrap();
        let index = catalog.get_index("students", "idx_id").unwrap();
        assert_eq!(index.borrow().key_columns(), &["id".to_string()]);
    }
}
