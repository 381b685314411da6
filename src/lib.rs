mod buffer_pool;
mod config;
mod disk_manager;
mod errors;
mod execution;
mod pages;
mod record;
mod table;

pub use buffer_pool::{ArcBufferPool, BufferPoolManager};
pub use config::{Config, ReplacerKind};
pub use disk_manager::DiskManager;
pub use errors::Error;
pub use execution::{
    Executor, FilterExecutor, JoinExecutor, JoinType, ProjectionExecutor, SeqScanExecutor,
    SortExecutor,
};
pub use pages::{FileId, PageId, Rid, FILE_HEADER_PAGE_ID, INVALID_PAGE_ID, INVALID_RID, PAGE_SIZE};
pub use record::{DataType, Field, Record, Schema, Value};
pub use table::{Layout, TableHandle};

/// Debug-only trace logging, compiled out of release builds.
#[macro_export]
macro_rules! printdbg {
    ($val: expr $(, $args: expr)*) => {
        #[cfg(debug_assertions)]
        println!($val $(, $args)*)
    };
}

/// Resolves the name of the calling function, used to make [`printdbg`] traces
/// readable when several layers (executor, table handle, buffer pool) log in
/// the same request.
#[macro_export]
macro_rules! get_caller_name {
    () => {{
        let mut bt = backtrace::Backtrace::new_unresolved();
        bt.resolve();
        let frames = bt.frames();
        if frames.len() > 1 {
            let caller_frame = &frames[1];
            if let Some(symbol) = caller_frame.symbols().first() {
                if let Some(name) = symbol.name() {
                    name.to_string()
                } else {
                    "Unknown Caller".to_string()
                }
            } else {
                "Unknown Caller".to_string()
            }
        } else {
            "No Caller Found".to_string()
        }
    }};
}
