//! A file-backed, block-keyed page store.
//!
//! This is the thin contract the spec treats as an external collaborator
//! (an embedded record-keyed key-value library with fixed-length values).
//! No such crate ships in this workspace, so it is implemented directly on
//! `std::fs::File`: one physical file per relation/index, pages addressed
//! by `offset = block_id * PAGE_SIZE`. Block 0 is always written as a
//! reserved, zeroed page at `create()` time so addressing stays uniform.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{BlockId, PAGE_SIZE};

/// A page-sized byte buffer.
pub type PageBytes = [u8; PAGE_SIZE];

pub fn zero_page() -> PageBytes {
    [0u8; PAGE_SIZE]
}

/// A single open record file backing one relation or index.
pub struct RecordFile {
    path: PathBuf,
    file: Option<File>,
    /// Number of blocks currently allocated, including reserved block 0.
    block_count: u32,
}

impl RecordFile {
    /// Create a new record file at `path`, truncating any existing content,
    /// and write the reserved block 0.
    pub fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)?;
        let mut rf = Self {
            path,
            file: Some(file),
            block_count: 0,
        };
        rf.append(&zero_page())?;
        Ok(rf)
    }

    /// Reopen an existing record file and recover `block_count` from its
    /// length on disk.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let len = file.metadata()?.len();
        let block_count = (len / PAGE_SIZE as u64) as u32;
        Ok(Self {
            path,
            file: Some(file),
            block_count,
        })
    }

    /// Number of blocks currently allocated (including reserved block 0).
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    /// Read the page stored at `block_id`.
    pub fn get(&mut self, block_id: BlockId) -> std::io::Result<PageBytes> {
        let file = self.file.as_mut().expect("record file is closed");
        let mut buf = zero_page();
        file.seek(SeekFrom::Start(block_id as u64 * PAGE_SIZE as u64))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite the page stored at `block_id`. `block_id` must already be
    /// allocated (i.e. `< block_count`).
    pub fn put(&mut self, block_id: BlockId, bytes: &PageBytes) -> std::io::Result<()> {
        let file = self.file.as_mut().expect("record file is closed");
        file.seek(SeekFrom::Start(block_id as u64 * PAGE_SIZE as u64))?;
        file.write_all(bytes)?;
        file.flush()
    }

    /// Allocate a new block holding `bytes` and return its id.
    pub fn append(&mut self, bytes: &PageBytes) -> std::io::Result<BlockId> {
        let block_id = self.block_count;
        self.block_count += 1;
        self.put(block_id, bytes)?;
        Ok(block_id)
    }

    /// Release the underlying file handle. Closing an already-closed file
    /// is a no-op.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Close and delete the underlying file from disk.
    pub fn drop_file(mut self) -> std::io::Result<()> {
        self.close();
        fs::remove_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_reserves_block_zero() {
        let dir = tempdir().unwrap();
        let rf = RecordFile::create(dir.path().join("t.db")).unwrap();
        assert_eq!(rf.block_count(), 1);
    }

    #[test]
    fn append_get_put_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let mut rf = RecordFile::create(&path).unwrap();

        let mut page = zero_page();
        page[0] = 42;
        let id = rf.append(&page).unwrap();
        assert_eq!(id, 1);

        let read_back = rf.get(id).unwrap();
        assert_eq!(read_back[0], 42);

        page[1] = 7;
        rf.put(id, &page).unwrap();
        let read_back = rf.get(id).unwrap();
        assert_eq!(read_back[1], 7);
    }

    #[test]
    fn open_recovers_block_count() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let mut rf = RecordFile::create(&path).unwrap();
            rf.append(&zero_page()).unwrap();
            rf.append(&zero_page()).unwrap();
            rf.close();
        }
        let rf = RecordFile::open(&path).unwrap();
        assert_eq!(rf.block_count(), 3);
    }

    #[test]
    fn drop_file_removes_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        let rf = RecordFile::create(&path).unwrap();
        rf.drop_file().unwrap();
        assert!(!path.exists());
    }
}
