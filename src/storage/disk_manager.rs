//! Disk Manager - low-level file I/O for database pages.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// Pages are laid out sequentially; page N lives at offset `N × PAGE_SIZE`:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096    ...    N×4096
/// ```
///
/// Page ids are allocated by the buffer pool, not here, so a write may land
/// past the current end of file; the file is extended on demand. Reading a
/// page that has never been written yields zeroes.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. The buffer pool serializes access
/// behind its own mutex.
///
/// # Durability
/// Every write is followed by `fsync()`.
pub struct DiskManager {
    file: File,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self { file })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Read a page from disk into `page`.
    ///
    /// A page at or past the end of file reads as all zeroes: the pool may
    /// fetch an allocated page before its first write-back.
    pub fn read_page(&mut self, page_id: PageId, page: &mut Page) -> Result<()> {
        let offset = page_id.file_offset();
        let file_size = self.file.metadata()?.len();

        if offset + PAGE_SIZE as u64 > file_size {
            page.reset();
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(page.as_mut_slice())?;
        Ok(())
    }

    /// Write a page to disk, extending the file if needed.
    ///
    /// # Durability
    /// Calls `fsync()` after writing.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of whole pages currently in the file.
    pub fn page_count(&self) -> Result<u32> {
        let file_size = self.file.metadata()?.len();
        Ok((file_size / PAGE_SIZE as u64) as u32)
    }

    /// Total size of the database file in bytes.
    pub fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_new_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let dm = DiskManager::create(&path).unwrap();
        assert_eq!(dm.page_count().unwrap(), 0);
        assert_eq!(dm.file_size().unwrap(), 0);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        DiskManager::create(&path).unwrap();
        assert!(DiskManager::create(&path).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.db");

        assert!(DiskManager::open(&path).is_err());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path).unwrap();

        let mut page = Page::new();
        page.as_mut_slice()[0] = 0xAB;
        page.as_mut_slice()[4095] = 0xCD;
        dm.write_page(PageId::new(3), &page).unwrap();

        // Writing page 3 extended the file to four pages.
        assert_eq!(dm.page_count().unwrap(), 4);

        let mut out = Page::new();
        dm.read_page(PageId::new(3), &mut out).unwrap();
        assert_eq!(out.as_slice()[0], 0xAB);
        assert_eq!(out.as_slice()[4095], 0xCD);
    }

    #[test]
    fn test_read_unwritten_page_is_zeroed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        let mut dm = DiskManager::create(&path).unwrap();

        let mut page = Page::new();
        page.as_mut_slice().fill(0xFF);
        dm.read_page(PageId::new(7), &mut page).unwrap();

        assert!(page.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_reopen_preserves_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let mut dm = DiskManager::create(&path).unwrap();
            let mut page = Page::new();
            page.as_mut_slice()[10] = 0x42;
            dm.write_page(PageId::new(0), &page).unwrap();
        }

        let mut dm = DiskManager::open(&path).unwrap();
        let mut page = Page::new();
        dm.read_page(PageId::new(0), &mut page).unwrap();
        assert_eq!(page.as_slice()[10], 0x42);
    }
}
