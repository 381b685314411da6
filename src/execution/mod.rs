//! Pull-based query execution: every operator is a record-at-a-time
//! iterator implementing [`Executor`]. A parent owns its children as
//! `Box<dyn Executor>` and drives them synchronously — there is no
//! scheduler, no async, no cross-query concurrency here; a query runs to
//! completion on the thread that calls it.

mod filter;
mod join;
mod projection;
mod seq_scan;
mod sort;

pub use filter::FilterExecutor;
pub use join::{JoinExecutor, JoinType};
pub use projection::ProjectionExecutor;
pub use seq_scan::SeqScanExecutor;
pub use sort::SortExecutor;

use crate::errors::Error;
use crate::record::{Record, Schema};

/// Common interface every operator in the tree implements. `init` primes
/// (or re-primes, for the join's inner child) state; `next` advances one
/// record; `get_record` reads the record `next` last produced; `is_end`
/// reports exhaustion. Callers must call `init` before the first `next`
/// and must not call `get_record` before a `next` that returned `Ok(())`
/// without `is_end()` becoming true.
pub trait Executor {
    fn init(&mut self) -> Result<(), Error>;

    fn next(&mut self) -> Result<(), Error>;

    fn is_end(&self) -> bool;

    fn get_out_schema(&self) -> &Schema;

    fn get_record(&self) -> &Record;
}
