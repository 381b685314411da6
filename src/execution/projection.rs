//! Reshapes each child record into a record conforming to the projection
//! schema. Purely a transform — `is_end` mirrors the child exactly, and no
//! state is kept beyond the one record last materialized.

use crate::errors::Error;
use crate::pages::INVALID_RID;
use crate::record::{Record, Schema};

use super::Executor;

pub struct ProjectionExecutor {
    child: Box<dyn Executor>,
    out_schema: Schema,
    current: Record,
}

impl ProjectionExecutor {
    pub fn new(child: Box<dyn Executor>, out_schema: Schema) -> Self {
        Self {
            current: Record::nulls(&out_schema, INVALID_RID),
            child,
            out_schema,
        }
    }

    fn refresh(&mut self) {
        if !self.child.is_end() {
            self.current = self.child.get_record().project(self.child.get_out_schema(), &self.out_schema);
        }
    }
}

impl Executor for ProjectionExecutor {
    fn init(&mut self) -> Result<(), Error> {
        self.child.init()?;
        self.refresh();
        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        self.child.next()?;
        self.refresh();
        Ok(())
    }

    fn is_end(&self) -> bool {
        self.child.is_end()
    }

    fn get_out_schema(&self) -> &Schema {
        &self.out_schema
    }

    fn get_record(&self) -> &Record {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::config::{Config, ReplacerKind};
    use crate::execution::seq_scan::SeqScanExecutor;
    use crate::record::{DataType, Field, Value};
    use crate::table::{Layout, TableHandle};
    use parking_lot::FairMutex;
    use std::sync::Arc;

    fn test_dir() -> std::path::PathBuf {
        use rand::Rng;
        let id: u64 = rand::thread_rng().gen();
        std::path::PathBuf::from(format!("data/test/projection_{id}"))
    }

    fn schema() -> Schema {
        Schema::new(vec![Field::new("id", DataType::I32), Field::new("v", DataType::I64)])
    }

    #[test]
    fn projects_each_record_and_tracks_child_exhaustion() {
        let dir = test_dir();
        let config = Config::new(8, 4096, ReplacerKind::Lru);
        let bpm = Arc::new(FairMutex::new(BufferPoolManager::new(&config, &dir).unwrap()));
        let mut table = TableHandle::open(bpm, 1, schema(), Layout::NAry).unwrap();
        table.insert_record(&[Value::I32(1), Value::I64(100)]).unwrap();
        table.insert_record(&[Value::I32(2), Value::I64(200)]).unwrap();

        let scan = SeqScanExecutor::new(table);
        let projected_schema = schema().project(&["v"]);
        let mut projection = ProjectionExecutor::new(Box::new(scan), projected_schema.clone());
        projection.init().unwrap();

        let mut values = Vec::new();
        while !projection.is_end() {
            values.push(projection.get_record().get_value(&projected_schema, 0));
            projection.next().unwrap();
        }
        assert_eq!(values, vec![Value::I64(100), Value::I64(200)]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
