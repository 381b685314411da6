use crate::errors::Error;
use crate::record::{Chunk, Record, Schema};

use super::{Page, SlotId};

/// Common interface over a data page's slot layout. `NAryPageHandle` stores
/// records row-wise; `PaxPageHandle` stores them column-partitioned within
/// the page. Both share the same occupancy bitmap and header placement, so
/// everything above the page layer (the table handle, the buffer pool) is
/// layout-agnostic.
pub trait PageHandle {
    /// Number of slots this page layout can hold given `rec_size`,
    /// `nullmap_size` and the page's fixed capacity.
    fn slot_capacity(rec_size: usize, nullmap_size: usize) -> usize
    where
        Self: Sized;

    fn get_bitmap(&self) -> &[u8];

    fn read_slot(&self, schema: &Schema, slot: SlotId) -> Result<Record, Error>;

    /// Copies `record`'s bytes into `slot`. When `mark_used` is set, also
    /// flips the occupancy bit and bumps `record_num` — callers that already
    /// know the slot is occupied (an in-place update) pass `false` so the
    /// count isn't double-counted.
    fn write_slot(&mut self, schema: &Schema, slot: SlotId, record: &Record, mark_used: bool) -> Result<(), Error>;

    fn delete_slot(&mut self, slot: SlotId);

    /// Reads every live slot into a columnar batch, projected to `schema`.
    fn read_chunk(&self, schema: &Schema) -> Chunk;

    fn record_num(&self) -> usize;

    fn page(&self) -> &Page;

    fn page_mut(&mut self) -> &mut Page;
}
