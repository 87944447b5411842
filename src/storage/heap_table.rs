//! Row-level API over a [`HeapFile`]: insert/select/project/delete, plus the
//! fixed-column marshalling format described in the spec.

use std::path::Path;

use crate::constants::Handle;
use crate::error::RelationError;
use crate::io::{read_bool, read_i32, read_text, write_text};
use crate::storage::heap_file::HeapFile;
use crate::value::{ColumnAttribute, ColumnDef, DataType, Row, Value};

/// A base table: a named, typed schema plus the heap file holding its rows.
pub struct HeapTable {
    name: String,
    columns: Vec<ColumnDef>,
    heap: HeapFile,
}

impl HeapTable {
    fn path_for(dir: &Path, name: &str) -> std::path::PathBuf {
        dir.join(format!("{name}.db"))
    }

    /// Create a brand-new table file. Fails if one already exists on disk.
    pub fn create(dir: &Path, name: &str, columns: Vec<ColumnDef>) -> Result<Self, RelationError> {
        let heap = HeapFile::create(Self::path_for(dir, name))?;
        Ok(Self {
            name: name.to_string(),
            columns,
            heap,
        })
    }

    /// Create the table file if it doesn't already exist, otherwise open it.
    pub fn create_if_not_exists(
        dir: &Path,
        name: &str,
        columns: Vec<ColumnDef>,
    ) -> Result<Self, RelationError> {
        if Self::path_for(dir, name).exists() {
            Self::open(dir, name, columns)
        } else {
            Self::create(dir, name, columns)
        }
    }

    /// Reopen a previously created table file.
    pub fn open(dir: &Path, name: &str, columns: Vec<ColumnDef>) -> Result<Self, RelationError> {
        let heap = HeapFile::open(Self::path_for(dir, name))?;
        Ok(Self {
            name: name.to_string(),
            columns,
            heap,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column_attribute(&self, name: &str) -> Option<ColumnAttribute> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, dt)| ColumnAttribute::new(*dt))
    }

    pub fn close(&mut self) {
        self.heap.close();
    }

    pub fn drop_table(self) -> Result<(), RelationError> {
        self.heap.drop_heap().map_err(RelationError::from)
    }

    /// Validate `row` against the declared schema, marshal it, and insert it
    /// into the last page with room, allocating a new page on [`NoRoom`] and
    /// retrying exactly once.
    ///
    /// [`NoRoom`]: crate::error::PageError::NoRoom
    pub fn insert(&mut self, row: &Row) -> Result<Handle, RelationError> {
        let bytes = marshal_row(&self.columns, row)?;

        let last = self.heap.last_block_id();
        let mut page = self.heap.get(last)?;
        let record_id = match page.add(&bytes) {
            Ok(id) => id,
            Err(_no_room) => {
                let mut fresh = self.heap.get_new()?;
                let id = fresh.add(&bytes)?;
                self.heap.put(&fresh)?;
                return Ok(Handle::new(fresh.block_id, id));
            }
        };
        self.heap.put(&page)?;
        Ok(Handle::new(page.block_id, record_id))
    }

    /// Return every live handle in the table, in block-ascending then
    /// record-ascending order. `_where` is accepted for interface parity
    /// with the original relation contract but is always ignored; WHERE
    /// pushdown is the job of [`crate::plan::EvalPlan`].
    pub fn select(&mut self, _where: Option<&Row>) -> Result<Vec<Handle>, RelationError> {
        let mut handles = Vec::new();
        for block_id in self.heap.block_ids() {
            let page = self.heap.get(block_id)?;
            for record_id in page.ids() {
                handles.push(Handle::new(block_id, record_id));
            }
        }
        Ok(handles)
    }

    /// Fetch and unmarshal the row at `handle`, optionally restricted to
    /// `cols`.
    pub fn project(&mut self, handle: Handle, cols: Option<&[String]>) -> Result<Row, RelationError> {
        let page = self.heap.get(handle.block_id)?;
        let bytes = page
            .get(handle.record_id)
            .ok_or(RelationError::RecordNotFound(handle))?;
        let row = unmarshal_row(&self.columns, &bytes);
        Ok(match cols {
            Some(cols) => row
                .into_iter()
                .filter(|(k, _)| cols.iter().any(|c| c == k))
                .collect(),
            None => row,
        })
    }

    /// Delete the row at `handle`.
    pub fn del(&mut self, handle: Handle) -> Result<(), RelationError> {
        let mut page = self.heap.get(handle.block_id)?;
        page.del(handle.record_id)?;
        self.heap.put(&page)?;
        Ok(())
    }
}

/// Marshal `row` into bytes in declared column order: INT as 4-byte LE
/// signed, TEXT as a 2-byte LE length prefix followed by raw bytes, BOOL as
/// a single byte (used only by catalog rows).
pub fn marshal_row(columns: &[ColumnDef], row: &Row) -> Result<Vec<u8>, RelationError> {
    let mut buf = Vec::new();
    for (name, data_type) in columns {
        let value = row
            .get(name)
            .ok_or_else(|| RelationError::UnknownColumn(name.clone()))?;
        if value.data_type() != *data_type {
            return Err(RelationError::TypeMismatch {
                column: name.clone(),
                expected: *data_type,
                actual: value.data_type(),
            });
        }
        match value {
            Value::Int(i) => buf.extend_from_slice(&i.to_le_bytes()),
            Value::Text(s) => write_text(&mut buf, s),
            Value::Bool(b) => buf.push(if *b { 1 } else { 0 }),
        }
    }
    Ok(buf)
}

/// Reverse of [`marshal_row`], reading a running offset across `columns` in
/// declared order.
pub fn unmarshal_row(columns: &[ColumnDef], bytes: &[u8]) -> Row {
    let mut offset = 0;
    let mut row = Row::new();
    for (name, data_type) in columns {
        match data_type {
            DataType::Int => {
                row.insert(name.clone(), Value::Int(read_i32(bytes, offset)));
                offset += 4;
            }
            DataType::Text => {
                let (s, consumed) = read_text(bytes, offset);
                row.insert(name.clone(), Value::Text(s));
                offset += consumed;
            }
            DataType::Bool => {
                row.insert(name.clone(), Value::Bool(read_bool(bytes, offset)));
                offset += 1;
            }
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(a: i32, b: &str) -> Row {
        Row::from([
            ("a".to_string(), Value::Int(a)),
            ("b".to_string(), Value::Text(b.to_string())),
        ])
    }

    fn cols() -> Vec<ColumnDef> {
        vec![
            ("a".to_string(), DataType::Int),
            ("b".to_string(), DataType::Text),
        ]
    }

    #[test]
    fn marshal_unmarshal_round_trips() {
        let r = row(12, "Hello!");
        let bytes = marshal_row(&cols(), &r).unwrap();
        let back = unmarshal_row(&cols(), &bytes);
        assert_eq!(back, r);
    }

    #[test]
    fn insert_then_project_returns_same_row() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let r = row(12, "Hello!");
        let handle = table.insert(&r).unwrap();
        assert_eq!(table.project(handle, None).unwrap(), r);
    }

    #[test]
    fn insert_select_preserves_order_single_page() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let h1 = table.insert(&row(1, "one")).unwrap();
        let h2 = table.insert(&row(2, "two")).unwrap();
        assert_eq!(table.select(None).unwrap(), vec![h1, h2]);
    }

    #[test]
    fn del_removes_from_select_but_not_project_before() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let h1 = table.insert(&row(1, "one")).unwrap();
        let h2 = table.insert(&row(2, "two")).unwrap();
        table.del(h1).unwrap();
        assert_eq!(table.select(None).unwrap(), vec![h2]);
    }

    #[test]
    fn project_with_restricted_columns() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let handle = table.insert(&row(12, "Hello!")).unwrap();
        let projected = table
            .project(handle, Some(&["a".to_string()]))
            .unwrap();
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("a"), Some(&Value::Int(12)));
    }

    #[test]
    fn insert_overflowing_row_fails_with_no_room() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let huge = "x".repeat(5000);
        let err = table.insert(&row(1, &huge)).unwrap_err();
        assert!(matches!(err, RelationError::NoRoom(_)));
    }

    #[test]
    fn insert_spills_to_new_page_when_full() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let mut last_block = None;
        for i in 0..400 {
            let h = table.insert(&row(i, "padding-value-xx")).unwrap();
            last_block = Some(h.block_id);
        }
        assert!(last_block.unwrap() > 1);
    }
}
