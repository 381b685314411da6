//! PAX data page: the same header and occupancy bitmap as the N-ary layout,
//! but the slot region is column-partitioned rather than row-partitioned.
//! Each field gets its own stripe of `capacity` contiguous values, and the
//! null bitmap gets a stripe of its own ahead of the field stripes. A scan
//! that only touches a few columns then only has to bring those stripes into
//! cache, at the cost of a record read having to gather from `N` places
//! instead of one contiguous slot.

use crate::errors::Error;
use crate::record::{Chunk, Record, Schema};

use super::bitmap;
use super::table_page::DataPageHeader;
use super::traits::PageHandle;
use super::{Page, PageId, Rid, SlotId, INVALID_PAGE_ID};

const DATA_HEADER_SIZE: usize = 8 + 8 + 8 + 8;

pub struct PaxPageHandle {
    page: Page,
    rec_size: usize,
    nullmap_size: usize,
    capacity: usize,
    /// Byte offset, within the page, of each field's stripe. Index
    /// `fields.len()` (one past the last field) is the null-bitmap stripe's
    /// offset; the occupancy bitmap precedes all of these.
    field_offset: Vec<usize>,
}

impl PaxPageHandle {
    fn bitmap_bytes(capacity: usize) -> usize {
        bitmap::byte_size(capacity)
    }

    fn compute_field_offsets(schema: &Schema, nullmap_size: usize, capacity: usize) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(schema.fields.len() + 1);
        let mut cursor = DATA_HEADER_SIZE + Self::bitmap_bytes(capacity);
        offsets.push(cursor); // null-bitmap stripe
        cursor += capacity * nullmap_size;
        for field in &schema.fields {
            offsets.push(cursor);
            cursor += capacity * field.ty.size();
        }
        offsets
    }

    pub fn init(mut page: Page, file_id: i64, page_id: PageId, schema: &Schema) -> Self {
        let rec_size = schema.rec_size();
        let nullmap_size = schema.nullmap_size();
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
            field_offset: Self::compute_field_offsets(schema, nullmap_size, capacity),
        }
    }

    pub fn from_page(page: Page, schema: &Schema) -> Self {
        let rec_size = schema.rec_size();
        let nullmap_size = schema.nullmap_size();
        let capacity = Self::slot_capacity(rec_size, nullmap_size);
        Self {
            page,
            rec_size,
            nullmap_size,
            capacity,
            field_offset: Self::compute_field_offsets(schema, nullmap_size, capacity),
        }
    }

    pub fn header(&self) -> DataPageHeader {
        DataPageHeader::read(&self.page)
    }

    pub fn page_id(&self) -> PageId {
        self.header().page_id
    }

    pub fn set_next_free_page_id(&mut self, next: PageId) {
        let mut header = self.header();
        header.next_free_page_id = next;
        header.write(&mut self.page);
    }

    pub fn is_full(&self) -> bool {
        self.header().record_num as usize >= self.capacity
    }

    fn null_bitmap_offset(&self, slot: SlotId) -> usize {
        self.field_offset[0] + slot as usize * self.nullmap_size
    }

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

impl PageHandle for PaxPageHandle {
    fn slot_capacity(rec_size: usize, nullmap_size: usize) -> usize {
        // Identical bound to the N-ary layout: the same bytes are present
        // per page, only their arrangement differs.
        super::table_page::NAryPageHandle::slot_capacity(rec_size, nullmap_size)
    }

    fn get_bitmap(&self) -> &[u8] {
        self.page.read_bytes(DATA_HEADER_SIZE, Self::bitmap_bytes(self.capacity))
    }

    fn read_slot(&self, schema: &Schema, slot: SlotId) -> Result<Record, Error> {
        let rid = Rid::new(self.page_id(), slot);
        if !bitmap::get_bit(self.get_bitmap(), slot as usize) {
            return Err(Error::RecordMiss(rid));
        }

        let null_bitmap = self
            .page
            .read_bytes(self.null_bitmap_offset(slot), self.nullmap_size)
            .to_vec();

        let mut body = vec![0u8; self.rec_size];
        let mut body_cursor = 0;
        for (i, field) in schema.fields.iter().enumerate() {
            let width = field.ty.size();
            let stripe_start = self.field_offset[i + 1] + slot as usize * width;
            let value = self.page.read_bytes(stripe_start, width);
            body[body_cursor..body_cursor + width].copy_from_slice(value);
            body_cursor += width;
        }

        Ok(Record::from_parts(&body, &null_bitmap, rid))
    }

    fn write_slot(&mut self, schema: &Schema, slot: SlotId, record: &Record, mark_used: bool) -> Result<(), Error> {
        let null_offset = self.null_bitmap_offset(slot);
        self.page.write_bytes(null_offset, record.null_bitmap());

        let body = record.body();
        let mut body_cursor = 0;
        for (i, field) in schema.fields.iter().enumerate() {
            let width = field.ty.size();
            let stripe_start = self.field_offset[i + 1] + slot as usize * width;
            self.page.write_bytes(stripe_start, &body[body_cursor..body_cursor + width]);
            body_cursor += width;
        }

        if mark_used {
            let bitmap_offset = DATA_HEADER_SIZE;
            let mut bitmap_bytes = self.page.read_bytes(bitmap_offset, Self::bitmap_bytes(self.capacity)).to_vec();
            bitmap::set_bit(&mut bitmap_bytes, slot as usize, true);
            self.page.write_bytes(bitmap_offset, &bitmap_bytes);

            let mut header = self.header();
            header.record_num += 1;
            header.write(&mut self.page);
        }
        Ok(())
    }

    fn delete_slot(&mut self, slot: SlotId) {
        let bitmap_offset = DATA_HEADER_SIZE;
        let mut bitmap_bytes = self.page.read_bytes(bitmap_offset, Self::bitmap_bytes(self.capacity)).to_vec();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DataType, Field, Value};

    fn schema() -> Schema {
        Schema::new(vec![Field::new("id", DataType::I32), Field::new("v", DataType::I64)])
    }

    #[test]
    fn insert_and_read_back_two_rows() {
        let schema = schema();
        let mut handle = PaxPageHandle::init(Page::new(), 1, 1, &schema);

        let r1 = handle
            .insert(&schema, &Record::new(&schema, &[Value::I32(1), Value::I64(10)], crate::pages::INVALID_RID))
            .unwrap();
        let r2 = handle
            .insert(&schema, &Record::new(&schema, &[Value::I32(2), Value::I64(20)], crate::pages::INVALID_RID))
            .unwrap();

        let row1 = handle.read_slot(&schema, r1.slot_id).unwrap();
        let row2 = handle.read_slot(&schema, r2.slot_id).unwrap();
        assert_eq!(row1.get_value(&schema, 0), Value::I32(1));
        assert_eq!(row2.get_value(&schema, 1), Value::I64(20));
        assert_eq!(handle.record_num(), 2);
    }

    #[test]
    fn delete_clears_bitmap_bit() {
        let schema = schema();
        let mut handle = PaxPageHandle::init(Page::new(), 1, 1, &schema);
        let rid = handle
            .insert(&schema, &Record::new(&schema, &[Value::I32(1), Value::I64(10)], crate::pages::INVALID_RID))
            .unwrap();
        handle.delete_slot(rid.slot_id);
        assert!(matches!(handle.read_slot(&schema, rid.slot_id), Err(Error::RecordMiss(_))));
    }
}
