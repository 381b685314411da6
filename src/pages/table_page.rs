//! Page 0 of every table file is a `TableHeader`; every other page is a data
//! page carrying a `DataPageHeader`, an occupancy bitmap, and a slot region.
//! Free data pages are threaded together through `next_free_page_id` into a
//! singly linked list rooted at the header's `first_free_page`.

use crate::errors::Error;
use crate::record::{Chunk, Record, Schema};

use super::bitmap;
use super::traits::PageHandle;
use super::{Page, PageId, Rid, SlotId, INVALID_PAGE_ID};

const TABLE_HEADER_SIZE: usize = 8 * 5;
const DATA_HEADER_SIZE: usize = 8 + 8 + 8 + 8;

/// Metadata stored on the file's page 0, describing how every data page in
/// the file is laid out. `first_free_page` roots the singly linked list of
/// pages that still have at least one free slot, threaded through each
/// page's `next_free_page_id`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableHeader {
    pub page_num: i64,
    pub rec_size: i64,
    pub nullmap_size: i64,
    pub rec_per_page: i64,
    pub first_free_page: PageId,
}

impl TableHeader {
    pub fn new(rec_size: usize, nullmap_size: usize) -> Self {
        let rec_per_page = NAryPageHandle::slot_capacity(rec_size, nullmap_size);
        Self {
            page_num: 0,
            rec_size: rec_size as i64,
            nullmap_size: nullmap_size as i64,
            rec_per_page: rec_per_page as i64,
            first_free_page: INVALID_PAGE_ID,
        }
    }

    pub fn read(page: &Page) -> Self {
        let bytes = page.read_bytes(0, TABLE_HEADER_SIZE);
        let field = |i: usize| i64::from_ne_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
        Self {
            page_num: field(0),
            rec_size: field(1),
            nullmap_size: field(2),
            rec_per_page: field(3),
            first_free_page: field(4),
        }
    }

    pub fn write(&self, page: &mut Page) {
        let mut bytes = [0u8; TABLE_HEADER_SIZE];
        let fields = [
            self.page_num,
            self.rec_size,
            self.nullmap_size,
            self.rec_per_page,
            self.first_free_page,
        ];
        for (i, value) in fields.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&value.to_ne_bytes());
        }
        page.write_bytes(0, &bytes);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPageHeader {
    pub file_id: i64,
    pub page_id: PageId,
    pub record_num: i64,
    pub next_free_page_id: PageId,
}

impl DataPageHeader {
    fn read(page: &Page) -> Self {
        let bytes = page.read_bytes(0, DATA_HEADER_SIZE);
        let field = |i: usize| i64::from_ne_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
        Self {
            file_id: field(0),
            page_id: field(1),
            record_num: field(2),
            next_free_page_id: field(3),
        }
    }

    fn write(&self, page: &mut Page) {
        let mut bytes = [0u8; DATA_HEADER_SIZE];
        let fields = [self.file_id, self.page_id, self.record_num, self.next_free_page_id];
        for (i, value) in fields.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&value.to_ne_bytes());
        }
        page.write_bytes(0, &bytes);
    }
}

/// Row-wise data page: every slot is `nullmap_size + rec_size` contiguous
/// bytes, one full record per slot.
pub struct NAryPageHandle {
    page: Page,
    rec_size: usize,
    nullmap_size: usize,
    capacity: usize,
}

impl NAryPageHandle {
    fn bitmap_offset() -> usize {
        DATA_HEADER_SIZE
    }

    fn slot_width(rec_size: usize, nullmap_size: usize) -> usize {
        nullmap_size + rec_size
    }

    /// Wraps a freshly zeroed page as a new, empty data page.
    pub fn init(mut page: Page, file_id: i64, page_id: PageId, rec_size: usize, nullmap_size: usize) -> Self {
        let capacity = Self::slot_capacity(rec_size, nullmap_size);
        DataPageHeader {
            file_id,
            page_id,
            record_num: 0,
            next_free_page_id: INVALID_PAGE_ID,
        }
        .write(&mut page);
        Self {
            page,
            rec_size,
            nullmap_size,
            capacity,
        }
    }

    /// Wraps an existing page already holding a `DataPageHeader`.
    pub fn from_page(page: Page, rec_size: usize, nullmap_size: usize) -> Self {
        let capacity = Self::slot_capacity(rec_size, nullmap_size);
        Self {
            page,
            rec_size,
            nullmap_size,
            capacity,
        }
    }

    pub fn header(&self) -> DataPageHeader {
        DataPageHeader::read(&self.page)
    }

    pub fn set_next_free_page_id(&mut self, next: PageId) {
        let mut header = self.header();
        header.next_free_page_id = next;
        header.write(&mut self.page);
    }

    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    pub fn is_full(&self) -> bool {
        self.header().record_num as usize >= self.capacity
    }

    fn bitmap_bytes(&self) -> usize {
        bitmap::byte_size(self.capacity)
    }

    fn slot_offset(&self, slot: SlotId) -> usize {
        DATA_HEADER_SIZE + self.bitmap_bytes() + slot as usize * Self::slot_width(self.rec_size, self.nullmap_size)
    }

    /// Finds the lowest free slot and writes `record` into it, returning its
    /// rid. Errors with `NoFreeFrame`-adjacent semantics are the caller's
    /// concern (the page itself has no notion of "no room"; `is_full` guards
    /// that before this is called).
    pub fn insert(&mut self, schema: &Schema, record: &Record) -> Result<Rid, Error> {
        let free = bitmap::find_first(self.get_bitmap(), self.capacity, 0, false);
        if free >= self.capacity {
            return Err(Error::StorageIO("page has no free slot".into()));
        }
        let slot = free as SlotId;
        self.write_slot(schema, slot, record, true)?;
        Ok(Rid::new(self.page_id(), slot))
    }
}

impl PageHandle for NAryPageHandle {
    fn slot_capacity(rec_size: usize, nullmap_size: usize) -> usize {
        let slot_width = Self::slot_width(rec_size, nullmap_size);
        if slot_width == 0 {
            return 0;
        }
        // Grow the candidate capacity down from the naive bound until the
        // header + bitmap + slots actually fit in one page; the bitmap's own
        // size depends on the capacity being solved for.
        let mut capacity = (super::PAGE_SIZE - DATA_HEADER_SIZE) / slot_width;
        while capacity > 0 {
            let used = DATA_HEADER_SIZE + bitmap::byte_size(capacity) + capacity * slot_width;
            if used <= super::PAGE_SIZE {
                break;
            }
            capacity -= 1;
        }
        capacity
    }

    fn get_bitmap(&self) -> &[u8] {
        self.page.read_bytes(Self::bitmap_offset(), self.bitmap_bytes())
    }

    fn read_slot(&self, schema: &Schema, slot: SlotId) -> Result<Record, Error> {
        let rid = Rid::new(self.page_id(), slot);
        if !bitmap::get_bit(self.get_bitmap(), slot as usize) {
            return Err(Error::RecordMiss(rid));
        }
        let offset = self.slot_offset(slot);
        let null_bitmap = self.page.read_bytes(offset, self.nullmap_size);
        let body = self.page.read_bytes(offset + self.nullmap_size, self.rec_size);
        let _ = schema;
        Ok(Record::from_parts(body, null_bitmap, rid))
    }

    fn write_slot(&mut self, _schema: &Schema, slot: SlotId, record: &Record, mark_used: bool) -> Result<(), Error> {
        let offset = self.slot_offset(slot);
        self.page.write_bytes(offset, record.null_bitmap());
        self.page.write_bytes(offset + self.nullmap_size, record.body());

        if mark_used {
            let bitmap_offset = Self::bitmap_offset();
            let mut bitmap_bytes = self.page.read_bytes(bitmap_offset, self.bitmap_bytes()).to_vec();
            bitmap::set_bit(&mut bitmap_bytes, slot as usize, true);
            self.page.write_bytes(bitmap_offset, &bitmap_bytes);

            let mut header = self.header();
            header.record_num += 1;
            header.write(&mut self.page);
        }
        Ok(())
    }

    fn delete_slot(&mut self, slot: SlotId) {
        let bitmap_offset = Self::bitmap_offset();
        let mut bitmap_bytes = self.page.read_bytes(bitmap_offset, self.bitmap_bytes()).to_vec();
        bitmap::set_bit(&mut bitmap_bytes, slot as usize, false);
        self.page.write_bytes(bitmap_offset, &bitmap_bytes);

        let mut header = self.header();
        header.record_num -= 1;
        header.write(&mut self.page);
    }

    fn read_chunk(&self, schema: &Schema) -> Chunk {
        let mut chunk = Chunk::new(schema.clone());
        for slot in 0..self.capacity as SlotId {
            if bitmap::get_bit(self.get_bitmap(), slot as usize) {
                chunk.rows.push(self.read_slot(schema, slot).expect("bitmap says live"));
            }
        }
        chunk
    }

    fn record_num(&self) -> usize {
        self.header().record_num as usize
    }

    fn page(&self) -> &Page {
        &self.page
    }

    fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }
}
