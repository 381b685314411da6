//! Nested-loop join: for each outer (left) record the inner (right) child
//! is re-initialized and scanned to completion, exactly as the iterator
//! contract prescribes. The four join types only change which unmatched
//! sides get a null-padded row and whether that row is produced mid-scan
//! (left side) or after the whole outer loop (right side, since a right
//! row's match status isn't known until every outer row has had a chance
//! at it).
//!
//! Output rows are computed eagerly in `init`, which is an implementation
//! choice, not a contract change: every outer row still re-initializes and
//! drains the inner child exactly once, in order, so the externally visible
//! behavior (what gets emitted, and in what order) is identical to draining
//! the same logic lazily one `next()` at a time.

use std::rc::Rc;

use crate::errors::Error;
use crate::pages::INVALID_RID;
use crate::record::{concat, Record, Schema};

use super::Executor;

pub type JoinCondition = Rc<dyn Fn(&Record, &Record) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

pub struct JoinExecutor {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    join_type: JoinType,
    condition: JoinCondition,
    left_schema: Schema,
    right_schema: Schema,
    out_schema: Schema,
    rows: Vec<Record>,
    idx: usize,
}

impl JoinExecutor {
    pub fn new(left: Box<dyn Executor>, right: Box<dyn Executor>, join_type: JoinType, condition: JoinCondition) -> Self {
        let left_schema = left.get_out_schema().clone();
        let right_schema = right.get_out_schema().clone();
        let mut fields = left_schema.fields.clone();
        fields.extend(right_schema.fields.clone());
        Self {
            left,
            right,
            join_type,
            condition,
            out_schema: Schema::new(fields),
            left_schema,
            right_schema,
            rows: Vec::new(),
            idx: 0,
        }
    }

    fn emits_left_unmatched(&self) -> bool {
        matches!(self.join_type, JoinType::Left | JoinType::Full)
    }

    fn emits_right_unmatched(&self) -> bool {
        matches!(self.join_type, JoinType::Right | JoinType::Full)
    }
}

impl Executor for JoinExecutor {
    fn init(&mut self) -> Result<(), Error> {
        self.left.init()?;
        let mut rows = Vec::new();
        let mut right_matched: Vec<bool> = Vec::new();

        while !self.left.is_end() {
            let left_record = self.left.get_record().clone();
            self.right.init()?;

            let mut matched_any = false;
            let mut ridx = 0;
            while !self.right.is_end() {
                if ridx == right_matched.len() {
                    right_matched.push(false);
                }
                let right_record = self.right.get_record().clone();
                if (self.condition)(&left_record, &right_record) {
                    matched_any = true;
                    right_matched[ridx] = true;
                    rows.push(concat(&left_record, &self.left_schema, &right_record, &self.right_schema));
                }
                self.right.next()?;
                ridx += 1;
            }

            if !matched_any && self.emits_left_unmatched() {
                let right_nulls = Record::nulls(&self.right_schema, INVALID_RID);
                rows.push(concat(&left_record, &self.left_schema, &right_nulls, &self.right_schema));
            }

            self.left.next()?;
        }

        if self.emits_right_unmatched() {
            self.right.init()?;
            let left_nulls = Record::nulls(&self.left_schema, INVALID_RID);
            let mut ridx = 0;
            while !self.right.is_end() {
                if !right_matched.get(ridx).copied().unwrap_or(false) {
                    let right_record = self.right.get_record().clone();
                    rows.push(concat(&left_nulls, &self.left_schema, &right_record, &self.right_schema));
                }
                self.right.next()?;
                ridx += 1;
            }
        }

        self.rows = rows;
        self.idx = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        self.idx += 1;
        Ok(())
    }

    fn is_end(&self) -> bool {
        self.idx >= self.rows.len()
    }

    fn get_out_schema(&self) -> &Schema {
        &self.out_schema
    }

    fn get_record(&self) -> &Record {
        &self.rows[self.idx]
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

    fn test_dir(name: &str) -> std::path::PathBuf {
        use rand::Rng;
        let id: u64 = rand::thread_rng().gen();
        std::path::PathBuf::from(format!("data/test/join_{name}_{id}"))
    }

    fn outer_schema() -> Schema {
        Schema::new(vec![Field::new("k", DataType::I32)])
    }

    fn inner_schema() -> Schema {
        Schema::new(vec![Field::new("k", DataType::I32), Field::new("tag", DataType::I32)])
    }

    fn build_tables(dir: &std::path::Path, outer_rows: &[i32], inner_rows: &[(i32, i32)]) -> (TableHandle, TableHandle) {
        let config = Config::new(16, 4096, ReplacerKind::Lru);
        let bpm = Arc::new(FairMutex::new(BufferPoolManager::new(&config, dir).unwrap()));
        let mut outer = TableHandle::open(bpm.clone(), 1, outer_schema(), Layout::NAry).unwrap();
        for k in outer_rows {
            outer.insert_record(&[Value::I32(*k)]).unwrap();
        }
        let mut inner = TableHandle::open(bpm, 2, inner_schema(), Layout::NAry).unwrap();
        for (k, tag) in inner_rows {
            inner.insert_record(&[Value::I32(*k), Value::I32(*tag)]).unwrap();
        }
        (outer, inner)
    }

    fn key_condition() -> JoinCondition {
        let outer = outer_schema();
        let inner = inner_schema();
        Rc::new(move |l, r| l.get_value(&outer, 0) == r.get_value(&inner, 0))
    }

    #[test]
    fn inner_join_emits_only_matched_pairs_in_order() {
        let dir = test_dir("inner");
        let (outer, inner) = build_tables(&dir, &[1, 2], &[(1, 10), (1, 11), (2, 20)]);

        let left = SeqScanExecutor::new(outer);
        let right = SeqScanExecutor::new(inner);
        let mut join = JoinExecutor::new(Box::new(left), Box::new(right), JoinType::Inner, key_condition());
        join.init().unwrap();

        let out_schema = join.get_out_schema().clone();
        let mut rows = Vec::new();
        while !join.is_end() {
            let record = join.get_record();
            rows.push((record.get_value(&out_schema, 0), record.get_value(&out_schema, 2)));
            join.next().unwrap();
        }
        assert_eq!(
            rows,
            vec![
                (Value::I32(1), Value::I32(10)),
                (Value::I32(1), Value::I32(11)),
                (Value::I32(2), Value::I32(20)),
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn left_outer_join_pads_unmatched_outer_rows_with_nulls() {
        let dir = test_dir("left");
        let (outer, inner) = build_tables(&dir, &[1, 2], &[(1, 10)]);

        let left = SeqScanExecutor::new(outer);
        let right = SeqScanExecutor::new(inner);
        let mut join = JoinExecutor::new(Box::new(left), Box::new(right), JoinType::Left, key_condition());
        join.init().unwrap();

        let out_schema = join.get_out_schema().clone();
        let mut rows = Vec::new();
        while !join.is_end() {
            let record = join.get_record();
            rows.push((record.get_value(&out_schema, 0), record.get_value(&out_schema, 2)));
            join.next().unwrap();
        }
        assert_eq!(rows, vec![(Value::I32(1), Value::I32(10)), (Value::I32(2), Value::Null)]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn right_outer_join_emits_each_unmatched_inner_row_exactly_once() {
        let dir = test_dir("right");
        let (outer, inner) = build_tables(&dir, &[1], &[(1, 10), (2, 20), (2, 21)]);

        let left = SeqScanExecutor::new(outer);
        let right = SeqScanExecutor::new(inner);
        let mut join = JoinExecutor::new(Box::new(left), Box::new(right), JoinType::Right, key_condition());
        join.init().unwrap();

        let out_schema = join.get_out_schema().clone();
        let mut rows = Vec::new();
        while !join.is_end() {
            let record = join.get_record();
            rows.push((record.get_value(&out_schema, 0), record.get_value(&out_schema, 2)));
            join.next().unwrap();
        }
        assert_eq!(
            rows,
            vec![
                (Value::I32(1), Value::I32(10)),
                (Value::Null, Value::I32(20)),
                (Value::Null, Value::I32(21)),
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn full_outer_join_pads_both_unmatched_sides() {
        let dir = test_dir("full");
        let (outer, inner) = build_tables(&dir, &[1, 2], &[(1, 10), (3, 30)]);

        let left = SeqScanExecutor::new(outer);
        let right = SeqScanExecutor::new(inner);
        let mut join = JoinExecutor::new(Box::new(left), Box::new(right), JoinType::Full, key_condition());
        join.init().unwrap();

        let out_schema = join.get_out_schema().clone();
        let mut rows = Vec::new();
        while !join.is_end() {
            let record = join.get_record();
            rows.push((record.get_value(&out_schema, 0), record.get_value(&out_schema, 2)));
            join.next().unwrap();
        }
        assert_eq!(
            rows,
            vec![
                (Value::I32(1), Value::I32(10)),
                (Value::I32(2), Value::Null),
                (Value::Null, Value::I32(30)),
            ]
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
