//! Sort, in two modes. When the child's entire output fits in
//! `sort_buffer_size` bytes, it is drained into one buffer, sorted in
//! place, and streamed back — no disk involved. When it doesn't, the child
//! is drained in `max_rec_num`-record chunks, each chunk is sorted and
//! spilled to a run file, and the runs are then repeatedly k-way merged
//! (fan-in equal to `max_rec_num`, so the run size and the merge width
//! share the same memory budget) until one file remains.
//!
//! Records are spilled as a flat sequence of `nullmap_size + rec_size`
//! bytes each — no per-record framing, since the schema already fixes the
//! length. Every run file this executor ever creates is tracked in
//! `temp_files` and removed on drop, success or failure alike.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::config::{TMP_DIR, TMP_SUFFIX};
use crate::errors::Error;
use crate::pages::INVALID_RID;
use crate::record::{Record, Schema, Value};

use super::Executor;

/// Process-wide, not stable across restarts: temp files are removed at
/// executor teardown, so a collision would only ever matter within one
/// running process, and this counter rules that out.
static SORT_EXECUTOR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn record_len(schema: &Schema) -> usize {
    schema.nullmap_size() + schema.rec_size()
}

fn encode(record: &Record, out: &mut Vec<u8>) {
    out.extend_from_slice(record.null_bitmap());
    out.extend_from_slice(record.body());
}

fn decode(schema: &Schema, bytes: &[u8]) -> Record {
    let (null_bitmap, body) = bytes.split_at(schema.nullmap_size());
    Record::from_parts(body, null_bitmap, INVALID_RID)
}

fn read_record(file: &mut File, schema: &Schema) -> Result<Option<Record>, Error> {
    let mut buf = vec![0u8; record_len(schema)];
    match file.read_exact(&mut buf) {
        Ok(()) => Ok(Some(decode(schema, &buf))),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

enum State {
    NotStarted,
    InMemory { rows: Vec<Record>, idx: usize },
    External { file: File, current: Option<Record> },
}

pub struct SortExecutor {
    child: Box<dyn Executor>,
    child_schema: Schema,
    key_schema: Schema,
    descending: bool,
    sort_buffer_size: usize,
    id: u64,
    state: State,
    /// Every run/merge-output file created by this executor that hasn't
    /// been consumed (and deleted) by a later merge pass yet. Drop sweeps
    /// whatever is left here, which on the happy path is just the final
    /// result file and on an error path is every orphaned run.
    temp_files: Vec<PathBuf>,
}

impl SortExecutor {
    pub fn new(child: Box<dyn Executor>, key_schema: Schema, descending: bool, sort_buffer_size: usize) -> Self {
        let child_schema = child.get_out_schema().clone();
        let id = SORT_EXECUTOR_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
        Self {
            child,
            child_schema,
            key_schema,
            descending,
            sort_buffer_size,
            id,
            state: State::NotStarted,
            temp_files: Vec::new(),
        }
    }

    fn extract_key(&self, record: &Record) -> Vec<Value> {
        self.key_schema
            .fields
            .iter()
            .map(|f| {
                let idx = self
                    .child_schema
                    .index_of(&f.name)
                    .unwrap_or_else(|| panic!("sort key field {} not present in child schema", f.name));
                record.get_value(&self.child_schema, idx)
            })
            .collect()
    }

    fn cmp_records(&self, a: &Record, b: &Record) -> Ordering {
        for field in &self.key_schema.fields {
            let idx = self.child_schema.index_of(&field.name).expect("sort key field in child schema");
            let ord = a.get_value(&self.child_schema, idx).cmp_value(&b.get_value(&self.child_schema, idx));
            if ord != Ordering::Equal {
                return if self.descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    }

    fn run_path(&self, group: usize, index: usize) -> PathBuf {
        Path::new(TMP_DIR).join(format!("sort_result_{}_{}_{}{}", self.id, group, index, TMP_SUFFIX))
    }

    /// Sorts `rows` and writes them as one run file, tracked for cleanup.
    fn spill_chunk(&mut self, mut rows: Vec<Record>, group: usize, index: usize) -> Result<PathBuf, Error> {
        rows.sort_by(|a, b| self.cmp_records(a, b));
        let path = self.run_path(group, index);
        let mut buf = Vec::with_capacity(rows.len() * record_len(&self.child_schema));
        for row in &rows {
            encode(row, &mut buf);
        }
        let mut file = File::create(&path)?;
        file.write_all(&buf)?;
        self.temp_files.push(path.clone());
        Ok(path)
    }

    /// Merges `fan_in` inputs at a time into one new group of output runs,
    /// removing each fully-consumed input as it goes.
    fn merge_pass(&mut self, group: usize, inputs: Vec<PathBuf>, fan_in: usize) -> Result<Vec<PathBuf>, Error> {
        let mut outputs = Vec::new();
        for (out_index, chunk) in inputs.chunks(fan_in).enumerate() {
            let out_path = self.run_path(group + 1, out_index);
            self.merge_chunk(chunk, &out_path)?;
            outputs.push(out_path.clone());
            self.temp_files.push(out_path);
        }
        for input in &inputs {
            let _ = std::fs::remove_file(input);
            self.temp_files.retain(|p| p != input);
        }
        Ok(outputs)
    }

    /// k-way merges `inputs` into `out_path` using a heap of size
    /// `inputs.len()`, one buffered record per open input stream.
    fn merge_chunk(&self, inputs: &[PathBuf], out_path: &Path) -> Result<(), Error> {
        let mut files: Vec<File> = inputs.iter().map(File::open).collect::<std::io::Result<_>>()?;
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();

        for (stream, file) in files.iter_mut().enumerate() {
            if let Some(record) = read_record(file, &self.child_schema)? {
                let key = self.extract_key(&record);
                heap.push(HeapEntry {
                    key,
                    descending: self.descending,
                    stream,
                    record,
                });
            }
        }

        let mut out = Vec::new();
        while let Some(entry) = heap.pop() {
            encode(&entry.record, &mut out);
            if let Some(next) = read_record(&mut files[entry.stream], &self.child_schema)? {
                let key = self.extract_key(&next);
                heap.push(HeapEntry {
                    key,
                    descending: self.descending,
                    stream: entry.stream,
                    record: next,
                });
            }
        }

        let mut output = File::create(out_path)?;
        output.write_all(&out)?;
        Ok(())
    }
}

/// A heap entry carries its already-extracted sort key rather than the
/// whole record plus a comparator, so `Ord` can be implemented without
/// reaching back into the executor. Ties break on ascending stream index,
/// which is what makes repeated merge passes produce a stable order.
struct HeapEntry {
    key: Vec<Value>,
    descending: bool,
    stream: usize,
    record: Record,
}

impl HeapEntry {
    fn key_cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.key.iter().zip(other.key.iter()) {
            let mut ord = a.cmp_value(b);
            if self.descending {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal && self.stream == other.stream
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    /// `BinaryHeap` is a max-heap but the merge wants the smallest key out
    /// first, so the key comparison (and the stream tie-break) are both
    /// reversed here.
    fn cmp(&self, other: &Self) -> Ordering {
        self.key_cmp(other).reverse().then_with(|| other.stream.cmp(&self.stream))
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<(), Error> {
        self.child.init()?;
        let max_rec_num = (self.sort_buffer_size / record_len(&self.child_schema).max(1)).max(1);

        let mut buffer = Vec::with_capacity(max_rec_num);
        while !self.child.is_end() && buffer.len() < max_rec_num {
            buffer.push(self.child.get_record().clone());
            self.child.next()?;
        }

        if self.child.is_end() {
            buffer.sort_by(|a, b| self.cmp_records(a, b));
            self.state = State::InMemory { rows: buffer, idx: 0 };
            return Ok(());
        }

        std::fs::create_dir_all(TMP_DIR)?;
        let mut group0 = vec![self.spill_chunk(buffer, 0, 0)?];

        let mut index = 1;
        loop {
            let mut chunk = Vec::with_capacity(max_rec_num);
            while !self.child.is_end() && chunk.len() < max_rec_num {
                chunk.push(self.child.get_record().clone());
                self.child.next()?;
            }
            if chunk.is_empty() {
                break;
            }
            group0.push(self.spill_chunk(chunk, 0, index)?);
            index += 1;
        }

        let fan_in = max_rec_num.max(2);
        let mut group = 0;
        let mut files = group0;
        while files.len() > 1 {
            files = self.merge_pass(group, files, fan_in)?;
            group += 1;
        }

        let final_path = files.into_iter().next().expect("external sort always produces at least one run");
        let mut file = File::open(&final_path)?;
        let current = read_record(&mut file, &self.child_schema)?;
        self.state = State::External { file, current };
        Ok(())
    }

    fn next(&mut self) -> Result<(), Error> {
        match &mut self.state {
            State::InMemory { idx, .. } => {
                *idx += 1;
                Ok(())
            }
            State::External { file, current } => {
                *current = read_record(file, &self.child_schema)?;
                Ok(())
            }
            State::NotStarted => Ok(()),
        }
    }

    fn is_end(&self) -> bool {
        match &self.state {
            State::NotStarted => true,
            State::InMemory { rows, idx } => *idx >= rows.len(),
            State::External { current, .. } => current.is_none(),
        }
    }

    fn get_out_schema(&self) -> &Schema {
        &self.child_schema
    }

    fn get_record(&self) -> &Record {
        match &self.state {
            State::InMemory { rows, idx } => &rows[*idx],
            State::External { current, .. } => current.as_ref().expect("get_record called past end of sort output"),
            State::NotStarted => panic!("get_record called before init"),
        }
    }
}

impl Drop for SortExecutor {
    fn drop(&mut self) {
        for path in self.temp_files.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}
