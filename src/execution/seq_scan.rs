//! The leaf of every operator tree: a forward scan over a table handle's
//! live records, driven entirely by `TableHandle::get_first_rid` /
//! `get_next_rid`. Every other executor eventually bottoms out here.

use crate::errors::Error;
use crate::pages::{Rid, INVALID_RID};
use crate::record::{Record, Schema};
use crate::table::TableHandle;

use super::Executor;

pub struct SeqScanExecutor {
    table: TableHandle,
    out_schema: Schema,
    cursor: Rid,
    current: Record,
    ended: bool,
}

impl SeqScanExecutor {
    pub fn new(table: TableHandle) -> Self {
        let out_schema = table.schema().clone();
        Self {
            table,
            current: Record::nulls(&out_schema, INVALID_RID),
            out_schema,
            cursor: INVALID_RID,
            ended: true,
        }
    }

    fn load_cursor(&mut self) -> Result<(), Error> {
        self.ended = self.cursor == INVALID_RID;
        if !self.ended {
            self.current = self.table.get_record(self.cursor)?;
        }
        Ok(())
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<(), Error> {
        self.cursor = self.table.get_first_rid();
        self.load_cursor()
    }

    fn next(&mut self) -> Result<(), Error> {
        self.cursor = self.table.get_next_rid(self.cursor);
        self.load_cursor()
    }

    fn is_end(&self) -> bool {
        self.ended
    }

    fn get_out_schema(&self) -> &Schema {
        &self.out_schema
    }

    fn get_record(&self) -> &Record {
        &self.current
    }
}
