//! The table handle is the storage layer's public surface: it owns a schema
//! and a file id, and turns rid-addressed CRUD calls into buffer-pool fetch
//! / page-handle / unpin sequences. Every operation pins at most one data
//! page (plus the header page, briefly) at a time and always unpins on every
//! exit path, including errors.
//!
//! Page allocation and reclamation both go through the header's
//! `first_free_page` list: a brand new page is threaded onto the list as
//! its sole member, and a page that fills up during an insert is unlinked
//! from the list's head. Deletes relink a page at the list's head the
//! moment it stops being full, regardless of where it previously sat.

pub mod iterator;

use std::sync::Arc;

use crate::buffer_pool::ArcBufferPool;
use crate::errors::Error;
use crate::pages::pax_page::PaxPageHandle;
use crate::pages::table_page::{DataPageHeader, NAryPageHandle, TableHeader};
use crate::pages::traits::PageHandle;
use crate::pages::{bitmap, FileId, Page, PageId, Rid, SlotId, FILE_HEADER_PAGE_ID, INVALID_PAGE_ID, INVALID_RID};
use crate::record::{Record, Schema, Value};

pub use iterator::TableIterator;

/// Which on-disk arrangement a table's data pages use. Chosen once, at
/// table creation, and fixed for the table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    NAry,
    Pax,
}

enum Handle {
    NAry(NAryPageHandle),
    Pax(PaxPageHandle),
}

/// Cheap to clone: a table handle is a `(file_id, schema, layout)` triple
/// plus a shared handle to the buffer pool, not an owner of any page. The
/// executor tree clones handles freely (e.g. a nested-loop join's inner
/// child gets its own clone) since every clone still talks to the same
/// pool and sees the same on-disk table.
#[derive(Clone)]
pub struct TableHandle {
    file_id: FileId,
    schema: Arc<Schema>,
    layout: Layout,
    bpm: ArcBufferPool,
}

impl TableHandle {
    /// Opens a table file, initializing its header page if the file is
    /// brand new (a page whose `rec_per_page` reads back as zero).
    pub fn open(bpm: ArcBufferPool, file_id: FileId, schema: Schema, layout: Layout) -> Result<Self, Error> {
        let mut guard = bpm.lock();
        let frame_id = guard.fetch_page(file_id, FILE_HEADER_PAGE_ID)?;
        let header = TableHeader::read(guard.get_page(frame_id));

        if header.rec_per_page == 0 {
            let fresh = TableHeader::new(schema.rec_size(), schema.nullmap_size());
            fresh.write(guard.get_page_mut(frame_id));
            guard.unpin_page(file_id, FILE_HEADER_PAGE_ID, true);
        } else {
            guard.unpin_page(file_id, FILE_HEADER_PAGE_ID, false);
        }
        drop(guard);

        Ok(Self {
            file_id,
            schema: Arc::new(schema),
            layout,
            bpm,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    fn read_header(&self) -> Result<TableHeader, Error> {
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, FILE_HEADER_PAGE_ID)?;
        let header = TableHeader::read(guard.get_page(frame_id));
        guard.unpin_page(self.file_id, FILE_HEADER_PAGE_ID, false);
        Ok(header)
    }

    fn write_header(&self, header: &TableHeader) -> Result<(), Error> {
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, FILE_HEADER_PAGE_ID)?;
        header.write(guard.get_page_mut(frame_id));
        guard.unpin_page(self.file_id, FILE_HEADER_PAGE_ID, true);
        Ok(())
    }

    fn wrap(&self, page: Page) -> Handle {
        match self.layout {
            Layout::NAry => Handle::NAry(NAryPageHandle::from_page(page, self.schema.rec_size(), self.schema.nullmap_size())),
            Layout::Pax => Handle::Pax(PaxPageHandle::from_page(page, &self.schema)),
        }
    }

    fn init_page(&self, page: Page, page_id: PageId) -> Handle {
        match self.layout {
            Layout::NAry => Handle::NAry(NAryPageHandle::init(
                page,
                self.file_id,
                page_id,
                self.schema.rec_size(),
                self.schema.nullmap_size(),
            )),
            Layout::Pax => Handle::Pax(PaxPageHandle::init(page, self.file_id, page_id, &self.schema)),
        }
    }

    fn handle_bytes<'a>(&self, handle: &'a Handle) -> &'a [u8; crate::pages::PAGE_SIZE] {
        match handle {
            Handle::NAry(h) => h.page().as_bytes(),
            Handle::Pax(h) => h.page().as_bytes(),
        }
    }

    fn data_header(&self, handle: &Handle) -> DataPageHeader {
        match handle {
            Handle::NAry(h) => h.header(),
            Handle::Pax(h) => h.header(),
        }
    }

    fn set_next_free(&self, handle: &mut Handle, next: PageId) {
        match handle {
            Handle::NAry(h) => h.set_next_free_page_id(next),
            Handle::Pax(h) => h.set_next_free_page_id(next),
        }
    }

    fn is_full(&self, handle: &Handle) -> bool {
        match handle {
            Handle::NAry(h) => h.is_full(),
            Handle::Pax(h) => h.is_full(),
        }
    }

    fn bit(&self, handle: &Handle, slot: SlotId) -> bool {
        let bitmap = match handle {
            Handle::NAry(h) => h.get_bitmap(),
            Handle::Pax(h) => h.get_bitmap(),
        };
        bitmap::get_bit(bitmap, slot as usize)
    }

    fn write_slot_handle(&self, handle: &mut Handle, slot: SlotId, record: &Record, mark_used: bool) -> Result<(), Error> {
        match handle {
            Handle::NAry(h) => h.write_slot(&self.schema, slot, record, mark_used),
            Handle::Pax(h) => h.write_slot(&self.schema, slot, record, mark_used),
        }
    }

    fn delete_slot_handle(&self, handle: &mut Handle, slot: SlotId) {
        match handle {
            Handle::NAry(h) => h.delete_slot(slot),
            Handle::Pax(h) => h.delete_slot(slot),
        }
    }

    fn insert_into_handle(&self, handle: &mut Handle, record: &Record) -> Result<Rid, Error> {
        match handle {
            Handle::NAry(h) => h.insert(&self.schema, record),
            Handle::Pax(h) => h.insert(&self.schema, record),
        }
    }

    pub fn get_record(&self, rid: Rid) -> Result<Record, Error> {
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, rid.page_id)?;
        let page = guard.get_page(frame_id).clone();
        guard.unpin_page(self.file_id, rid.page_id, false);
        drop(guard);

        match self.wrap(page) {
            Handle::NAry(h) => h.read_slot(&self.schema, rid.slot_id),
            Handle::Pax(h) => h.read_slot(&self.schema, rid.slot_id),
        }
    }

    /// Inserts into the page rooted at `first_free_page`, allocating a
    /// brand new page (threaded onto the free list as its sole member)
    /// when the list is empty.
    pub fn insert_record(&mut self, values: &[Value]) -> Result<Rid, Error> {
        let record = Record::new(&self.schema, values, INVALID_RID);
        let mut header = self.read_header()?;

        let is_new = header.first_free_page == INVALID_PAGE_ID;
        let page_id = if is_new {
            header.page_num += 1;
            header.page_num
        } else {
            header.first_free_page
        };

        let mut guard = self.bpm.lock();
        let frame_id = if is_new {
            guard.new_page(self.file_id, page_id)?
        } else {
            guard.fetch_page(self.file_id, page_id)?
        };
        let page = guard.get_page(frame_id).clone();
        let mut handle = if is_new { self.init_page(page, page_id) } else { self.wrap(page) };

        if is_new {
            self.set_next_free(&mut handle, header.first_free_page);
            header.first_free_page = page_id;
        }

        let rid = self.insert_into_handle(&mut handle, &record)?;

        if self.is_full(&handle) {
            header.first_free_page = self.data_header(&handle).next_free_page_id;
        }

        guard.get_page_mut(frame_id).as_bytes_mut().copy_from_slice(self.handle_bytes(&handle));
        guard.unpin_page(self.file_id, page_id, true);
        drop(guard);

        self.write_header(&header)?;
        Ok(rid)
    }

    /// Inserts at a caller-chosen rid, used by the sort executor's external
    /// merge when it rebuilds a table from spilled runs and by tests that
    /// need deterministic rids. Fails with `RecordExists` if the slot is
    /// already occupied; `INVALID_PAGE_ID` fails with `PageMiss`.
    pub fn insert_record_at(&mut self, rid: Rid, values: &[Value]) -> Result<(), Error> {
        if rid.page_id == INVALID_PAGE_ID {
            return Err(Error::PageMiss(rid.page_id));
        }
        let record = Record::new(&self.schema, values, rid);

        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, rid.page_id)?;
        let page = guard.get_page(frame_id).clone();
        let mut handle = self.wrap(page);

        if self.bit(&handle, rid.slot_id) {
            guard.unpin_page(self.file_id, rid.page_id, false);
            return Err(Error::RecordExists(rid));
        }

        self.write_slot_handle(&mut handle, rid.slot_id, &record, true)?;

        let became_full = self.is_full(&handle);
        let next_free = self.data_header(&handle).next_free_page_id;

        guard.get_page_mut(frame_id).as_bytes_mut().copy_from_slice(self.handle_bytes(&handle));
        guard.unpin_page(self.file_id, rid.page_id, true);
        drop(guard);

        if became_full {
            let mut header = self.read_header()?;
            header.first_free_page = next_free;
            self.write_header(&header)?;
        }
        Ok(())
    }

    pub fn delete_record(&mut self, rid: Rid) -> Result<(), Error> {
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, rid.page_id)?;
        let page = guard.get_page(frame_id).clone();
        let mut handle = self.wrap(page);

        if !self.bit(&handle, rid.slot_id) {
            guard.unpin_page(self.file_id, rid.page_id, false);
            return Err(Error::RecordMiss(rid));
        }

        let was_full = self.is_full(&handle);
        self.delete_slot_handle(&mut handle, rid.slot_id);

        guard.get_page_mut(frame_id).as_bytes_mut().copy_from_slice(self.handle_bytes(&handle));
        guard.unpin_page(self.file_id, rid.page_id, true);
        drop(guard);

        if was_full {
            self.link_free_head(rid.page_id)?;
        }
        Ok(())
    }

    /// Threads `page_id` onto the head of the free list. Called right after
    /// a delete takes a page from full to non-full.
    fn link_free_head(&self, page_id: PageId) -> Result<(), Error> {
        let mut header = self.read_header()?;

        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, page_id)?;
        let page = guard.get_page(frame_id).clone();
        let mut handle = self.wrap(page);
        self.set_next_free(&mut handle, header.first_free_page);
        guard.get_page_mut(frame_id).as_bytes_mut().copy_from_slice(self.handle_bytes(&handle));
        guard.unpin_page(self.file_id, page_id, true);
        drop(guard);

        header.first_free_page = page_id;
        self.write_header(&header)?;
        Ok(())
    }

    /// Overwrites slot bytes in place; record length is constant by schema
    /// so a rid never moves.
    pub fn update_record(&mut self, rid: Rid, values: &[Value]) -> Result<(), Error> {
        let record = Record::new(&self.schema, values, rid);
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, rid.page_id)?;
        let page = guard.get_page(frame_id).clone();
        let mut handle = self.wrap(page);

        if !self.bit(&handle, rid.slot_id) {
            guard.unpin_page(self.file_id, rid.page_id, false);
            return Err(Error::RecordMiss(rid));
        }

        self.write_slot_handle(&mut handle, rid.slot_id, &record, false)?;
        guard.get_page_mut(frame_id).as_bytes_mut().copy_from_slice(self.handle_bytes(&handle));
        guard.unpin_page(self.file_id, rid.page_id, true);
        Ok(())
    }

    /// Live-bit bitmap for one data page, pinned only for the copy.
    fn bitmap_of(&self, page_id: PageId) -> Result<Vec<u8>, Error> {
        let mut guard = self.bpm.lock();
        let frame_id = guard.fetch_page(self.file_id, page_id)?;
        let page = guard.get_page(frame_id).clone();
        guard.unpin_page(self.file_id, page_id, false);
        drop(guard);

        Ok(match self.wrap(page) {
            Handle::NAry(h) => h.get_bitmap().to_vec(),
            Handle::Pax(h) => h.get_bitmap().to_vec(),
        })
    }

    /// Forward scan in `(page_id ascending, slot_id ascending)` order,
    /// `INVALID_RID` on exhaustion. Pages start at `FILE_HEADER_PAGE_ID + 1`.
    pub fn get_first_rid(&self) -> Rid {
        let Ok(header) = self.read_header() else {
            return INVALID_RID;
        };
        self.scan_from(&header, FILE_HEADER_PAGE_ID + 1, 0)
    }

    pub fn get_next_rid(&self, rid: Rid) -> Rid {
        let Ok(header) = self.read_header() else {
            return INVALID_RID;
        };
        self.scan_from(&header, rid.page_id, rid.slot_id as usize + 1)
    }

    fn scan_from(&self, header: &TableHeader, mut page_id: PageId, mut start: usize) -> Rid {
        let rec_per_page = header.rec_per_page as usize;
        while page_id <= header.page_num {
            let bitmap = match self.bitmap_of(page_id) {
                Ok(bitmap) => bitmap,
                Err(_) => return INVALID_RID,
            };
            let slot = bitmap::find_first(&bitmap, rec_per_page, start, true);
            if slot < rec_per_page {
                return Rid::new(page_id, slot as SlotId);
            }
            page_id += 1;
            start = 0;
        }
        INVALID_RID
    }

    pub fn iter(&self) -> TableIterator<'_> {
        TableIterator::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::config::Config;
    use crate::record::{DataType, Field};
    use parking_lot::FairMutex;

    fn test_dir() -> std::path::PathBuf {
        use rand::Rng;
        let id: u64 = rand::thread_rng().gen();
        std::path::PathBuf::from(format!("data/test/table_{id}"))
    }

    fn schema() -> Schema {
        Schema::new(vec![Field::new("id", DataType::I32), Field::new("v", DataType::I64)])
    }

    fn test_table(buffer_pool_size: usize) -> (TableHandle, std::path::PathBuf) {
        let dir = test_dir();
        let config = Config::new(buffer_pool_size, 4096, crate::config::ReplacerKind::Lru);
        let bpm = Arc::new(FairMutex::new(BufferPoolManager::new(&config, &dir).unwrap()));
        let table = TableHandle::open(bpm, 1, schema(), Layout::NAry).unwrap();
        (table, dir)
    }

    #[test]
    fn insert_then_scan_in_order() {
        let (mut table, dir) = test_table(8);
        let r1 = table.insert_record(&[Value::I32(1), Value::I64(10)]).unwrap();
        let r2 = table.insert_record(&[Value::I32(2), Value::I64(20)]).unwrap();
        let r3 = table.insert_record(&[Value::I32(3), Value::I64(30)]).unwrap();

        assert_eq!(table.get_first_rid(), r1);
        assert_eq!(table.get_next_rid(r1), r2);
        assert_eq!(table.get_next_rid(r2), r3);
        assert_eq!(table.get_next_rid(r3), INVALID_RID);

        assert_eq!(table.get_record(r1).unwrap().get_value(&schema(), 0), Value::I32(1));
        assert_eq!(table.get_record(r3).unwrap().get_value(&schema(), 1), Value::I64(30));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn update_in_place_does_not_move_rid() {
        let (mut table, dir) = test_table(8);
        let rid = table.insert_record(&[Value::I32(1), Value::I64(10)]).unwrap();
        table.update_record(rid, &[Value::I32(1), Value::I64(99)]).unwrap();
        assert_eq!(table.get_record(rid).unwrap().get_value(&schema(), 1), Value::I64(99));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_raises_record_miss_on_reread() {
        let (mut table, dir) = test_table(8);
        let rid = table.insert_record(&[Value::I32(1), Value::I64(10)]).unwrap();
        table.delete_record(rid).unwrap();
        assert!(matches!(table.get_record(rid), Err(Error::RecordMiss(_))));
        assert!(matches!(table.delete_record(rid), Err(Error::RecordMiss(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn filling_last_free_page_unlinks_it_then_next_insert_allocates() {
        let (mut table, dir) = test_table(8);
        let rec_per_page = NAryPageHandle::slot_capacity(schema().rec_size(), schema().nullmap_size());

        let mut rids = Vec::new();
        for i in 0..rec_per_page {
            rids.push(table.insert_record(&[Value::I32(i as i32), Value::I64(0)]).unwrap());
        }
        // first page is now full and has been unlinked from the free list
        let header = table.read_header().unwrap();
        assert_eq!(header.first_free_page, INVALID_PAGE_ID);

        // the next insert must allocate a second page
        let overflow = table.insert_record(&[Value::I32(999), Value::I64(0)]).unwrap();
        assert_eq!(overflow.page_id, 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn delete_from_full_page_relinks_free_list_head() {
        let (mut table, dir) = test_table(8);
        let rec_per_page = NAryPageHandle::slot_capacity(schema().rec_size(), schema().nullmap_size());

        let mut rids = Vec::new();
        for i in 0..rec_per_page {
            rids.push(table.insert_record(&[Value::I32(i as i32), Value::I64(0)]).unwrap());
        }
        assert_eq!(table.read_header().unwrap().first_free_page, INVALID_PAGE_ID);

        table.delete_record(rids[0]).unwrap();
        assert_eq!(table.read_header().unwrap().first_free_page, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn insert_record_at_rejects_occupied_slot() {
        let (mut table, dir) = test_table(8);
        let rid = table.insert_record(&[Value::I32(1), Value::I64(10)]).unwrap();
        let err = table.insert_record_at(rid, &[Value::I32(2), Value::I64(20)]).unwrap_err();
        assert!(matches!(err, Error::RecordExists(_)));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn insert_record_at_invalid_page_raises_page_miss() {
        let (mut table, dir) = test_table(8);
        let err = table.insert_record_at(Rid::new(INVALID_PAGE_ID, 0), &[Value::I32(1), Value::I64(1)]).unwrap_err();
        assert!(matches!(err, Error::PageMiss(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
