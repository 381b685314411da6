//! One file per table, addressed by `file_id`; a page's `page_id` is its
//! offset within that file rather than a filename of its own (unlike the
//! reference implementation's one-file-per-page layout). Reading a page
//! past the file's current length returns a zeroed page instead of erroring,
//! so a table handle can `read_page(FILE_HEADER_PAGE_ID)` on a brand new
//! file and get back an all-zero header to initialize.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::errors::Error;
use crate::pages::{FileId, Page, PageId, PAGE_SIZE};

#[derive(Debug)]
pub struct DiskManager {
    directory: PathBuf,
}

impl DiskManager {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, Error> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn get_file_name(&self, file_id: FileId) -> PathBuf {
        Path::join(&self.directory, file_id.to_string())
    }

    pub fn read_page(&self, file_id: FileId, page_id: PageId) -> Result<Page, Error> {
        let path = self.get_file_name(file_id);
        let mut file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Page::new()),
            Err(err) => return Err(err.into()),
        };

        let offset = page_id as u64 * PAGE_SIZE as u64;
        let len = file.metadata()?.len();
        if offset >= len {
            return Ok(Page::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; PAGE_SIZE];
        let read = file.read(&mut buffer)?;
        // A page at the tail of a sparsely-written file may be short; the
        // rest is implicitly zero, matching a freshly allocated page.
        let _ = read;
        Ok(Page::from_bytes(&buffer))
    }

    pub fn write_page(&self, file_id: FileId, page_id: PageId, page: &Page) -> Result<(), Error> {
        let path = self.get_file_name(file_id);
        let mut file = OpenOptions::new().write(true).create(true).open(&path)?;

        let offset = page_id as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> PathBuf {
        use rand::Rng;
        let id: u64 = rand::thread_rng().gen();
        PathBuf::from(format!("data/test/disk_manager_{id}"))
    }

    #[test]
    fn reading_unwritten_page_returns_zeroed_page() {
        let dir = test_dir();
        let disk = DiskManager::new(&dir).unwrap();
        let page = disk.read_page(1, 3).unwrap();
        assert_eq!(page.as_bytes(), &[0u8; PAGE_SIZE]);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn write_then_read_round_trips_bytes() {
        let dir = test_dir();
        let disk = DiskManager::new(&dir).unwrap();

        let mut page = Page::new();
        page.write_bytes(0, b"hello disk");
        disk.write_page(7, 2, &page).unwrap();

        let read_back = disk.read_page(7, 2).unwrap();
        assert_eq!(read_back.read_bytes(0, 10), b"hello disk");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn different_page_ids_occupy_distinct_offsets() {
        let dir = test_dir();
        let disk = DiskManager::new(&dir).unwrap();

        let mut page0 = Page::new();
        page0.write_bytes(0, b"page-zero-");
        let mut page1 = Page::new();
        page1.write_bytes(0, b"page-one--");

        disk.write_page(1, 0, &page0).unwrap();
        disk.write_page(1, 1, &page1).unwrap();

        assert_eq!(disk.read_page(1, 0).unwrap().read_bytes(0, 10), b"page-zero-");
        assert_eq!(disk.read_page(1, 1).unwrap().read_bytes(0, 10), b"page-one--");

        std::fs::remove_dir_all(&dir).ok();
    }
}
