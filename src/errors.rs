use crate::pages::{PageId, Rid};

/// The error kinds callers must be able to distinguish. Everything else
/// (disk I/O failures, bad UTF-8 in a test fixture, ...) is carried through
/// as an opaque `anyhow::Error` via [`Error::StorageIO`].
#[derive(Debug)]
pub enum Error {
    RecordMiss(Rid),
    RecordExists(Rid),
    PageMiss(PageId),
    NoFreeFrame,
    UnknownReplacer(String),
    StorageIO(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RecordMiss(rid) => write!(f, "no record at {rid:?}"),
            Error::RecordExists(rid) => write!(f, "record already exists at {rid:?}"),
            Error::PageMiss(page_id) => write!(f, "invalid page id {page_id}"),
            Error::NoFreeFrame => write!(f, "buffer pool has no free frame to evict"),
            Error::UnknownReplacer(name) => write!(f, "unknown replacer policy: {name}"),
            Error::StorageIO(context) => write!(f, "storage I/O error: {context}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageIO(err.to_string())
    }
}
