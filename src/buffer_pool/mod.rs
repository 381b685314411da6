mod frame;
mod replacer;

use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use parking_lot::FairMutex;

use crate::config::{Config, ReplacerKind};
use crate::disk_manager::DiskManager;
use crate::errors::Error;
use crate::pages::{FileId, Page, PageId, INVALID_PAGE_ID};
use crate::{get_caller_name, printdbg};

use frame::Frame;
use replacer::{Lru, LruK, Replacer};

type FrameId = usize;

pub type ArcBufferPool = Arc<FairMutex<BufferPoolManager>>;

/// Coarse-grained buffer pool: one mutex guards the whole pool (frames,
/// page table, free list, replacer alike), traded for simplicity over a
/// per-page latch scheme. Callers pin a page for as long as they hold a
/// reference to its bytes and must unpin it on every exit path, including
/// error paths.
pub struct BufferPoolManager {
    disk_manager: DiskManager,

    free_frames: LinkedList<FrameId>,
    page_table: HashMap<(FileId, PageId), FrameId>,
    frames: Vec<Frame>,

    replacer: Box<dyn Replacer>,
}

impl BufferPoolManager {
    pub fn new(config: &Config, directory: impl Into<std::path::PathBuf>) -> Result<Self, Error> {
        let size = config.buffer_pool_size;
        let frames = (0..size).map(Frame::new).collect();
        let replacer: Box<dyn Replacer> = match config.replacer {
            ReplacerKind::Lru => Box::new(Lru::new(size)),
            ReplacerKind::LruK(k) => Box::new(LruK::new(size, k)),
        };

        Ok(Self {
            disk_manager: DiskManager::new(directory)?,
            free_frames: LinkedList::from_iter(0..size),
            page_table: HashMap::new(),
            frames,
            replacer,
        })
    }

    pub fn new_shared(config: &Config, directory: impl Into<std::path::PathBuf>) -> Result<ArcBufferPool, Error> {
        Ok(Arc::new(FairMutex::new(Self::new(config, directory)?)))
    }

    fn find_free_frame(&mut self) -> Result<FrameId, Error> {
        if let Some(frame_id) = self.free_frames.pop_front() {
            Ok(frame_id)
        } else if self.replacer.can_evict() {
            Ok(self.evict_frame()?)
        } else {
            Err(Error::NoFreeFrame)
        }
    }

    fn evict_frame(&mut self) -> Result<FrameId, Error> {
        let frame_id = self.replacer.evict();
        let frame = &mut self.frames[frame_id];
        assert_eq!(frame.pin_count(), 0, "replacer handed back a pinned frame");

        if frame.is_dirty() {
            printdbg!(
                "evicting dirty page {} (file {}) from frame {frame_id}, flushing first",
                frame.page_id(),
                frame.file_id()
            );
            self.disk_manager.write_page(frame.file_id(), frame.page_id(), frame.page())?;
            self.frames[frame_id].mark_clean();
        }

        self.page_table.remove(&(self.frames[frame_id].file_id(), self.frames[frame_id].page_id()));
        Ok(frame_id)
    }

    /// Pins and returns the frame index holding `(file_id, page_id)`,
    /// loading it from disk if it is not already resident.
    pub fn fetch_page(&mut self, file_id: FileId, page_id: PageId) -> Result<FrameId, Error> {
        let frame_id = if let Some(&frame_id) = self.page_table.get(&(file_id, page_id)) {
            frame_id
        } else {
            let page = self.disk_manager.read_page(file_id, page_id)?;
            let frame_id = self.find_free_frame()?;
            self.frames[frame_id].load(file_id, page_id, page);
            self.page_table.insert((file_id, page_id), frame_id);
            frame_id
        };

        let frame = &mut self.frames[frame_id];
        frame.pin();
        self.replacer.record_access(frame_id);

        printdbg!(
            "{} fetched file {file_id} page {page_id} (frame {frame_id}), pin count {}",
            get_caller_name!(),
            frame.pin_count()
        );

        Ok(frame_id)
    }

    /// Allocates and pins a brand new zeroed page at `(file_id, page_id)`.
    /// The caller (the table handle) is the authority on which page id is
    /// free; the pool only ever manages frames, not the on-disk free list.
    pub fn new_page(&mut self, file_id: FileId, page_id: PageId) -> Result<FrameId, Error> {
        let frame_id = self.find_free_frame()?;
        self.frames[frame_id].load(file_id, page_id, Page::new());
        self.page_table.insert((file_id, page_id), frame_id);

        let frame = &mut self.frames[frame_id];
        frame.pin();
        self.replacer.record_access(frame_id);
        Ok(frame_id)
    }

    pub fn get_page(&self, frame_id: FrameId) -> &Page {
        self.frames[frame_id].page()
    }

    pub fn get_page_mut(&mut self, frame_id: FrameId) -> &mut Page {
        self.frames[frame_id].page_mut()
    }

    /// Unpins `(file_id, page_id)`. `is_dirty` is sticky: once a page is
    /// marked dirty it stays dirty until flushed, even if a later unpin
    /// passes `false`. Returns `false` if the page is not resident or is
    /// already at pin count 0, without mutating anything.
    pub fn unpin_page(&mut self, file_id: FileId, page_id: PageId, is_dirty: bool) -> bool {
        let Some(&frame_id) = self.page_table.get(&(file_id, page_id)) else {
            return false;
        };
        let frame = &mut self.frames[frame_id];
        if !frame.try_unpin() {
            return false;
        }
        if is_dirty {
            let _ = frame.page_mut();
        }

        printdbg!(
            "{} unpinned file {file_id} page {page_id} (frame {frame_id}), pin count {}",
            get_caller_name!(),
            frame.pin_count()
        );

        if frame.pin_count() == 0 {
            self.replacer.set_evictable(frame_id, true);
        }
        true
    }

    /// Writes `(file_id, page_id)` back to disk if dirty. Returns `false`
    /// if the page is not resident; a resident clean page is a no-op that
    /// still returns `true`.
    pub fn flush_page(&mut self, file_id: FileId, page_id: PageId) -> Result<bool, Error> {
        let Some(&frame_id) = self.page_table.get(&(file_id, page_id)) else {
            return Ok(false);
        };
        let frame = &mut self.frames[frame_id];
        if frame.is_dirty() {
            self.disk_manager.write_page(file_id, page_id, frame.page())?;
            frame.mark_clean();
        }
        Ok(true)
    }

    pub fn flush_all(&mut self) -> Result<(), Error> {
        for frame in self.frames.iter_mut().filter(|f| f.is_dirty()) {
            self.disk_manager.write_page(frame.file_id(), frame.page_id(), frame.page())?;
            frame.mark_clean();
        }
        Ok(())
    }

    /// Flushes every resident page of `file_id`. Unlike `flush_page`, this
    /// flushes clean pages too (trivially, a no-op for them) so the caller
    /// doesn't have to track dirtiness itself.
    pub fn flush_all_pages(&mut self, file_id: FileId) -> Result<(), Error> {
        let keys: Vec<(FileId, PageId)> = self.page_table.keys().filter(|(f, _)| *f == file_id).copied().collect();
        for (file_id, page_id) in keys {
            self.flush_page(file_id, page_id)?;
        }
        Ok(())
    }

    /// Evicts a resident page without writing anything back after it: if
    /// dirty, flushes first, then returns its frame to the free list. A
    /// page pinned by someone else cannot be reclaimed (`false`); a page
    /// that was never resident is trivially "deleted" (`true`).
    pub fn delete_page(&mut self, file_id: FileId, page_id: PageId) -> Result<bool, Error> {
        let Some(&frame_id) = self.page_table.get(&(file_id, page_id)) else {
            return Ok(true);
        };
        if self.frames[frame_id].pin_count() > 0 {
            return Ok(false);
        }

        if self.frames[frame_id].is_dirty() {
            self.disk_manager.write_page(file_id, page_id, self.frames[frame_id].page())?;
        }

        self.frames[frame_id].load(0, INVALID_PAGE_ID, Page::new());
        self.page_table.remove(&(file_id, page_id));
        self.replacer.set_evictable(frame_id, false);
        self.free_frames.push_back(frame_id);
        Ok(true)
    }

    /// Deletes every resident page of `file_id`. Aggregates by AND: one
    /// still-pinned page makes the whole call report `false`, but every
    /// other eligible page is still reclaimed.
    pub fn delete_all_pages(&mut self, file_id: FileId) -> Result<bool, Error> {
        let keys: Vec<(FileId, PageId)> = self.page_table.keys().filter(|(f, _)| *f == file_id).copied().collect();
        let mut all_ok = true;
        for (file_id, page_id) in keys {
            all_ok &= self.delete_page(file_id, page_id)?;
        }
        Ok(all_ok)
    }

    #[cfg(test)]
    pub fn pin_count(&self, file_id: FileId, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.get(&(file_id, page_id))?;
        Some(self.frames[frame_id].pin_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> std::path::PathBuf {
        use rand::Rng;
        let id: u64 = rand::thread_rng().gen();
        std::path::PathBuf::from(format!("data/test/bpm_{id}"))
    }

    #[test]
    fn new_page_then_fetch_same_frame() {
        let dir = test_dir();
        let config = Config::new(4, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        let frame_id = bpm.new_page(1, 1).unwrap();
        bpm.get_page_mut(frame_id).write_bytes(0, b"hi");
        bpm.unpin_page(1, 1, true);

        let frame_id2 = bpm.fetch_page(1, 1).unwrap();
        assert_eq!(bpm.get_page(frame_id2).read_bytes(0, 2), b"hi");
        bpm.unpin_page(1, 1, false);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn no_free_frame_when_everything_pinned() {
        let dir = test_dir();
        let config = Config::new(1, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        bpm.new_page(1, 1).unwrap();
        let err = bpm.new_page(1, 2).unwrap_err();
        assert!(matches!(err, Error::NoFreeFrame));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn evicting_dirty_frame_flushes_to_disk() {
        let dir = test_dir();
        let config = Config::new(1, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        let frame_id = bpm.new_page(1, 1).unwrap();
        bpm.get_page_mut(frame_id).write_bytes(0, b"dirty");
        bpm.unpin_page(1, 1, true);

        // forces eviction of page (1,1) since the pool only has one frame
        let frame_id2 = bpm.new_page(1, 2).unwrap();
        bpm.unpin_page(1, 2, false);
        let _ = frame_id2;

        let page = bpm.fetch_page(1, 1).unwrap();
        assert_eq!(bpm.get_page(page).read_bytes(0, 5), b"dirty");
        bpm.unpin_page(1, 1, false);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_page_reclaims_an_unpinned_frame_but_not_a_pinned_one() {
        let dir = test_dir();
        let config = Config::new(2, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        bpm.new_page(1, 1).unwrap();
        assert!(!bpm.delete_page(1, 1).unwrap()); // still pinned

        bpm.unpin_page(1, 1, false);
        assert!(bpm.delete_page(1, 1).unwrap());
        assert!(!bpm.page_table.contains_key(&(1, 1)));

        // deleting something never resident is a no-op success
        assert!(bpm.delete_page(1, 99).unwrap());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_all_pages_flushes_dirty_pages_then_frees_every_frame() {
        let dir = test_dir();
        let config = Config::new(4, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        for page_id in 1..=3 {
            let frame_id = bpm.new_page(1, page_id).unwrap();
            bpm.get_page_mut(frame_id).write_bytes(0, &page_id.to_ne_bytes());
            bpm.unpin_page(1, page_id, true);
        }

        assert!(bpm.delete_all_pages(1).unwrap());
        for page_id in 1..=3 {
            assert!(!bpm.page_table.contains_key(&(1, page_id)));
        }

        // the flushed bytes are really on disk, not just dropped
        let page = bpm.fetch_page(1, 2).unwrap();
        assert_eq!(bpm.get_page(page).read_bytes(0, 8), &2i64.to_ne_bytes());
        bpm.unpin_page(1, 2, false);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn flush_all_pages_clears_dirty_flag_without_evicting() {
        let dir = test_dir();
        let config = Config::new(2, 4096, ReplacerKind::Lru);
        let mut bpm = BufferPoolManager::new(&config, &dir).unwrap();

        let frame_id = bpm.new_page(1, 1).unwrap();
        bpm.get_page_mut(frame_id).write_bytes(0, b"hi");
        bpm.unpin_page(1, 1, true);

        bpm.flush_all_pages(1).unwrap();
        assert!(bpm.page_table.contains_key(&(1, 1))); // still resident

        std::fs::remove_dir_all(&dir).ok();
    }
}
