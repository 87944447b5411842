//! Unique B+-tree-like secondary index over a [`crate::storage::heap_table::HeapTable`].
//!
//! One index is one [`crate::storage::record_file::RecordFile`], named
//! `"{table}-{index}"`. Block [`crate::constants::STAT_BLOCK`] holds a
//! [`node::BTreeStat`]; every other block holds either a [`node::BTreeLeaf`]
//! or a [`node::BTreeInterior`], tagged by its first byte.

pub mod node;

use std::path::{Path, PathBuf};

use crate::constants::{BlockId, Handle, STAT_BLOCK};
use crate::error::RelationError;
use crate::storage::heap_table::HeapTable;
use crate::storage::record_file::{zero_page, RecordFile};
use crate::value::{DataType, Row};

use node::{is_leaf, tkey_from_row, BTreeInterior, BTreeLeaf, BTreeStat, KeyValue};

/// Result of a split one level down: the newly allocated sibling's block id
/// and the key that separates it from its left neighbour.
type Insertion = Option<(BlockId, KeyValue)>;

/// A unique secondary index over `key_columns` of one table.
pub struct BTreeIndex {
    path: PathBuf,
    table: String,
    index_name: String,
    key_columns: Vec<String>,
    key_profile: Vec<DataType>,
    unique: bool,
    record_file: Option<RecordFile>,
    stat: Option<BTreeStat>,
}

impl BTreeIndex {
    /// Construct the in-memory handle for an index. Does not touch disk;
    /// call [`Self::create`] for a brand-new index or let the first
    /// lookup/insert open an existing one lazily.
    pub fn new(
        dir: &Path,
        table: impl Into<String>,
        index_name: impl Into<String>,
        key_columns: Vec<String>,
        key_profile: Vec<DataType>,
        unique: bool,
    ) -> Self {
        let table = table.into();
        let index_name = index_name.into();
        let path = dir.join(format!("{table}-{index_name}"));
        Self {
            path,
            table,
            index_name,
            key_columns,
            key_profile,
            unique,
            record_file: None,
            stat: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    fn rf(&mut self) -> &mut RecordFile {
        self.record_file.as_mut().expect("index is not open")
    }

    /// Open the underlying file if it isn't already, failing if it has
    /// never been created.
    fn ensure_open(&mut self) -> Result<(), RelationError> {
        if self.record_file.is_some() {
            return Ok(());
        }
        if !self.path.exists() {
            return Err(RelationError::UnknownIndex(
                self.index_name.clone(),
                self.table.clone(),
            ));
        }
        let mut rf = RecordFile::open(&self.path)?;
        let bytes = rf.get(STAT_BLOCK)?;
        self.stat = Some(BTreeStat::decode(&bytes));
        self.record_file = Some(rf);
        Ok(())
    }

    /// Create the index file fresh: a stat block, an empty leaf root, then
    /// populate it from every row currently in `relation`. Fails if the
    /// index is not unique, matching the source's "only unique indices are
    /// implemented" restriction.
    pub fn create(&mut self, relation: &mut HeapTable) -> Result<(), RelationError> {
        if !self.unique {
            return Err(RelationError::NotUnique);
        }
        let mut rf = RecordFile::create(&self.path)?;
        let stat_block = rf.append(&zero_page())?;
        debug_assert_eq!(stat_block, STAT_BLOCK);
        let root_id = rf.append(&zero_page())?;
        let stat = BTreeStat {
            root_id,
            height: 1,
            key_profile: self.key_profile.clone(),
        };
        rf.put(STAT_BLOCK, &stat.encode())?;
        let leaf = BTreeLeaf::default();
        rf.put(root_id, &leaf.encode(&self.key_profile))?;

        self.record_file = Some(rf);
        self.stat = Some(stat);

        let handles = relation.select(None)?;
        for handle in handles {
            self.insert(handle, relation)?;
        }
        Ok(())
    }

    /// Project the key columns of the row at `handle` via `relation` and
    /// insert `(key, handle)`.
    pub fn insert(&mut self, handle: Handle, relation: &mut HeapTable) -> Result<(), RelationError> {
        self.ensure_open()?;
        let row = relation.project(handle, Some(&self.key_columns))?;
        let key = tkey_from_row(&self.key_columns, &self.key_profile, &row)?;
        let root_id = self.stat.as_ref().unwrap().root_id;
        if let Some((new_block, boundary)) = self.insert_rec(root_id, &key, handle)? {
            self.grow_root(root_id, new_block, boundary)?;
        }
        Ok(())
    }

    fn grow_root(
        &mut self,
        old_root: BlockId,
        new_block: BlockId,
        boundary: KeyValue,
    ) -> Result<(), RelationError> {
        let interior = BTreeInterior {
            first: old_root,
            keys: vec![boundary],
            children: vec![new_block],
        };
        let new_root = self.rf().append(&zero_page())?;
        self.rf().put(new_root, &interior.encode(&self.key_profile))?;
        let stat = self.stat.as_mut().unwrap();
        stat.root_id = new_root;
        stat.height += 1;
        let encoded = stat.encode();
        self.rf().put(STAT_BLOCK, &encoded)?;
        Ok(())
    }

    fn insert_rec(
        &mut self,
        block_id: BlockId,
        key: &KeyValue,
        handle: Handle,
    ) -> Result<Insertion, RelationError> {
        let bytes = self.rf().get(block_id)?;
        if is_leaf(&bytes) {
            let mut leaf = BTreeLeaf::decode(&bytes, &self.key_profile);
            if leaf.entries.iter().any(|(k, _)| k == key) {
                return Err(RelationError::DuplicateKey);
            }
            let pos = leaf.entries.partition_point(|(k, _)| k < key);
            leaf.entries.insert(pos, (key.clone(), handle));

            if leaf.encoded_len(&self.key_profile) <= crate::constants::PAGE_SIZE {
                self.rf().put(block_id, &leaf.encode(&self.key_profile))?;
                return Ok(None);
            }

            let mid = leaf.entries.len() / 2;
            let right_entries = leaf.entries.split_off(mid);
            let boundary = right_entries[0].0.clone();
            let new_block = self.rf().append(&zero_page())?;
            let right_leaf = BTreeLeaf {
                entries: right_entries,
                next: leaf.next,
            };
            leaf.next = new_block as u64;
            self.rf().put(block_id, &leaf.encode(&self.key_profile))?;
            self.rf().put(new_block, &right_leaf.encode(&self.key_profile))?;
            return Ok(Some((new_block, boundary)));
        }

        let interior = BTreeInterior::decode(&bytes, &self.key_profile);
        let mut kids = interior.all_children();
        let mut keys = interior.keys.clone();
        let child_idx = keys.partition_point(|k| k <= key);
        let child_id = kids[child_idx];

        match self.insert_rec(child_id, key, handle)? {
            None => Ok(None),
            Some((new_child, boundary)) => {
                let pos = keys.partition_point(|k| k <= &boundary);
                keys.insert(pos, boundary);
                kids.insert(pos + 1, new_child);

                let candidate = BTreeInterior {
                    first: kids[0],
                    keys: keys.clone(),
                    children: kids[1..].to_vec(),
                };
                if candidate.encoded_len(&self.key_profile) <= crate::constants::PAGE_SIZE {
                    self.rf().put(block_id, &candidate.encode(&self.key_profile))?;
                    return Ok(None);
                }

                let mid = keys.len() / 2;
                let boundary = keys[mid].clone();
                let left_keys = keys[..mid].to_vec();
                let left_kids = kids[..=mid].to_vec();
                let right_keys = keys[mid + 1..].to_vec();
                let right_kids = kids[mid + 1..].to_vec();

                let left = BTreeInterior {
                    first: left_kids[0],
                    keys: left_keys,
                    children: left_kids[1..].to_vec(),
                };
                let right = BTreeInterior {
                    first: right_kids[0],
                    keys: right_keys,
                    children: right_kids[1..].to_vec(),
                };
                let new_block = self.rf().append(&zero_page())?;
                self.rf().put(block_id, &left.encode(&self.key_profile))?;
                self.rf().put(new_block, &right.encode(&self.key_profile))?;
                Ok(Some((new_block, boundary)))
            }
        }
    }

    /// Resolve `key_dict` against `key_columns`/`key_profile` and descend
    /// from the root to the leaf holding it. Returns an empty vector (never
    /// more than one handle, since the index is unique) if absent.
    pub fn lookup(&mut self, key_dict: &Row) -> Result<Vec<Handle>, RelationError> {
        self.ensure_open()?;
        let key = tkey_from_row(&self.key_columns, &self.key_profile, key_dict)?;
        let mut block_id = self.stat.as_ref().unwrap().root_id;
        loop {
            let bytes = self.rf().get(block_id)?;
            if is_leaf(&bytes) {
                let leaf = BTreeLeaf::decode(&bytes, &self.key_profile);
                return Ok(match leaf.entries.iter().find(|(k, _)| k == &key) {
                    Some((_, h)) => vec![*h],
                    None => vec![],
                });
            }
            let interior = BTreeInterior::decode(&bytes, &self.key_profile);
            let kids = interior.all_children();
            let idx = interior.keys.partition_point(|k| k <= &key);
            block_id = kids[idx];
        }
    }

    /// Unimplemented: range scans are out of scope.
    pub fn range(&mut self, _min: &Row, _max: &Row) -> Result<Vec<Handle>, RelationError> {
        Err(RelationError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "BTreeIndex::range is unimplemented",
        )))
    }

    /// Unimplemented: key removal is out of scope.
    pub fn del(&mut self, _handle: Handle) -> Result<(), RelationError> {
        Err(RelationError::Io(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "BTreeIndex::del is unimplemented",
        )))
    }

    /// Close and delete the underlying index file. A no-op deletion if the
    /// file was never created.
    pub fn drop_index(mut self) -> Result<(), RelationError> {
        self.record_file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RelationError::from(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::tempdir;

    fn cols() -> Vec<(String, DataType)> {
        vec![
            ("id".to_string(), DataType::Int),
            ("name".to_string(), DataType::Text),
        ]
    }

    fn row(id: i32, name: &str) -> Row {
        Row::from([
            ("id".to_string(), Value::Int(id)),
            ("name".to_string(), Value::Text(name.to_string())),
        ])
    }

    #[test]
    fn create_then_lookup_finds_inserted_row() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let h1 = table.insert(&row(1, "alice")).unwrap();
        table.insert(&row(2, "bob")).unwrap();

        let mut index = BTreeIndex::new(
            dir.path(),
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            true,
        );
        index.create(&mut table).unwrap();

        let key = Row::from([("id".to_string(), Value::Int(1))]);
        assert_eq!(index.lookup(&key).unwrap(), vec![h1]);

        let missing = Row::from([("id".to_string(), Value::Int(99))]);
        assert!(index.lookup(&missing).unwrap().is_empty());
    }

    #[test]
    fn duplicate_key_insert_fails() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        table.insert(&row(1, "alice")).unwrap();

        let mut index = BTreeIndex::new(
            dir.path(),
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            true,
        );
        index.create(&mut table).unwrap();

        let h2 = table.insert(&row(1, "duplicate")).unwrap();
        let err = index.insert(h2, &mut table).unwrap_err();
        assert!(matches!(err, RelationError::DuplicateKey));
    }

    #[test]
    fn many_inserts_force_leaf_and_interior_splits() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let mut index = BTreeIndex::new(
            dir.path(),
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            true,
        );
        index.create(&mut table).unwrap();

        let mut handles = Vec::new();
        for i in 0..400 {
            let h = table.insert(&row(i, "padding-value-for-split-xx")).unwrap();
            index.insert(h, &mut table).unwrap();
            handles.push((i, h));
        }

        assert!(index.stat.as_ref().unwrap().height >= 2);
        for (i, h) in handles {
            let key = Row::from([("id".to_string(), Value::Int(i))]);
            assert_eq!(index.lookup(&key).unwrap(), vec![h]);
        }
    }

    #[test]
    fn reopen_after_close_recovers_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let h1;
        {
            let mut table = HeapTable::create(&path, "t", cols()).unwrap();
            h1 = table.insert(&row(7, "seven")).unwrap();
            let mut index = BTreeIndex::new(
                &path,
                "t",
                "idx_id",
                vec!["id".to_string()],
                vec![DataType::Int],
                true,
            );
            index.create(&mut table).unwrap();
        }

        let mut index = BTreeIndex::new(
            &path,
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            true,
        );
        let key = Row::from([("id".to_string(), Value::Int(7))]);
        assert_eq!(index.lookup(&key).unwrap(), vec![h1]);
    }

    #[test]
    fn non_unique_create_is_rejected() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        table.insert(&row(1, "alice")).unwrap();
        let mut index = BTreeIndex::new(
            dir.path(),
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            false,
        );
        assert!(matches!(
            index.create(&mut table).unwrap_err(),
            RelationError::NotUnique
        ));
    }

    #[test]
    fn drop_index_removes_file() {
        let dir = tempdir().unwrap();
        let mut table = HeapTable::create(dir.path(), "t", cols()).unwrap();
        let mut index = BTreeIndex::new(
            dir.path(),
            "t",
            "idx_id",
            vec!["id".to_string()],
            vec![DataType::Int],
            true,
        );
        index.create(&mut table).unwrap();
        let path = dir.path().join("t-idx_id");
        assert!(path.exists());
        index.drop_index().unwrap();
        assert!(!path.exists());
    }
}
