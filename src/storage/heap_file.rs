//! An ordered set of slotted pages forming one physical relation.

use std::path::{Path, PathBuf};

use crate::constants::BlockId;
use crate::storage::record_file::{zero_page, RecordFile};
use crate::storage::slotted_page::SlottedPage;

/// A heap file is a sequence of [`SlottedPage`]s backed by one
/// [`RecordFile`]. Block 0 is reserved by the record file, so `last` (the
/// highest allocated user block) starts at 0 until the first page exists.
pub struct HeapFile {
    path: PathBuf,
    record_file: Option<RecordFile>,
    last: BlockId,
}

impl HeapFile {
    /// Create a brand-new heap file at `path` and allocate its first page,
    /// so the relation always has at least one page to insert into.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let record_file = RecordFile::create(&path)?;
        let mut heap = Self {
            path,
            record_file: Some(record_file),
            last: 0,
        };
        heap.get_new()?;
        Ok(heap)
    }

    /// Reopen an existing heap file and recover `last` from the underlying
    /// record file's block count.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let record_file = RecordFile::open(&path)?;
        let last = record_file.block_count().saturating_sub(1);
        Ok(Self {
            path,
            record_file: Some(record_file),
            last,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the underlying file handle. A no-op if already closed.
    pub fn close(&mut self) {
        if let Some(mut rf) = self.record_file.take() {
            rf.close();
        }
    }

    /// Close then delete the underlying file.
    pub fn drop_heap(mut self) -> std::io::Result<()> {
        let rf = self.record_file.take().expect("heap file already dropped");
        rf.drop_file()
    }

    /// Allocate a fresh zero-initialized page, assign it the next block id,
    /// and return it.
    pub fn get_new(&mut self) -> std::io::Result<SlottedPage> {
        let rf = self.record_file.as_mut().expect("heap file is closed");
        let block_id = rf.append(&zero_page())?;
        self.last = block_id;
        let page = SlottedPage::new(zero_page(), block_id, true);
        rf.put(block_id, &page.to_bytes())?;
        Ok(page)
    }

    /// Fetch the page stored at `block_id`.
    pub fn get(&mut self, block_id: BlockId) -> std::io::Result<SlottedPage> {
        let rf = self.record_file.as_mut().expect("heap file is closed");
        let bytes = rf.get(block_id)?;
        Ok(SlottedPage::new(bytes, block_id, false))
    }

    /// Write `page` back under its own block id.
    pub fn put(&mut self, page: &SlottedPage) -> std::io::Result<()> {
        let rf = self.record_file.as_mut().expect("heap file is closed");
        rf.put(page.block_id, &page.to_bytes())
    }

    /// All allocated block ids, ascending, excluding the reserved block 0.
    pub fn block_ids(&self) -> Vec<BlockId> {
        (1..=self.last).collect()
    }

    pub fn last_block_id(&self) -> BlockId {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_allocates_one_page() {
        let dir = tempdir().unwrap();
        let heap = HeapFile::create(dir.path().join("t.db")).unwrap();
        assert_eq!(heap.block_ids(), vec![1]);
    }

    #[test]
    fn get_new_appends_pages() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path().join("t.db")).unwrap();
        heap.get_new().unwrap();
        heap.get_new().unwrap();
        assert_eq!(heap.block_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn reopen_recovers_last() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut heap = HeapFile::create(&path).unwrap();
            heap.get_new().unwrap();
            heap.close();
        }
        let heap = HeapFile::open(&path).unwrap();
        assert_eq!(heap.block_ids(), vec![1, 2]);
    }

    #[test]
    fn put_then_get_round_trips_records() {
        let dir = tempdir().unwrap();
        let mut heap = HeapFile::create(dir.path().join("t.db")).unwrap();
        let mut page = heap.get(1).unwrap();
        page.add(b"row").unwrap();
        heap.put(&page).unwrap();

        let reread = heap.get(1).unwrap();
        assert_eq!(reread.get(1).unwrap(), b"row");
    }
}
