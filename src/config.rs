//! Ambient, process-wide knobs. The engine is embedded (no daemon, no config
//! file format of its own) so these are plain constructor arguments rather
//! than a loaded file; callers that do own a config file (a server binary,
//! a test harness) are expected to parse it themselves and fill in a
//! [`Config`].

use crate::errors::Error;
use anyhow::Result;

/// Directory spilled sort runs are written under.
pub const TMP_DIR: &str = "data/tmp";
/// Suffix appended to every spilled sort run file.
pub const TMP_SUFFIX: &str = ".run";

/// Which page-replacement policy the buffer pool should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacerKind {
    Lru,
    LruK(usize),
}

impl ReplacerKind {
    /// Parses the two names the spec allows on its config surface
    /// (`"LRUReplacer"` / `"LRUKReplacer"`), failing fatally on anything else.
    pub fn from_name(name: &str, lru_k: usize) -> Result<Self> {
        match name {
            "LRUReplacer" => Ok(ReplacerKind::Lru),
            "LRUKReplacer" => Ok(ReplacerKind::LruK(lru_k)),
            other => Err(Error::UnknownReplacer(other.to_string()).into()),
        }
    }
}

/// Buffer pool + sort sizing, gathered in one place so tests and the demo
/// binary can build small engines without dragging global statics around.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of frames the buffer pool manager holds.
    pub buffer_pool_size: usize,
    /// Byte budget for an in-memory sort run before it spills to disk.
    pub sort_buffer_size: usize,
    /// Page-replacement policy.
    pub replacer: ReplacerKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_pool_size: 64,
            sort_buffer_size: 4 * crate::pages::PAGE_SIZE,
            replacer: ReplacerKind::Lru,
        }
    }
}

impl Config {
    pub fn new(buffer_pool_size: usize, sort_buffer_size: usize, replacer: ReplacerKind) -> Self {
        Self {
            buffer_pool_size,
            sort_buffer_size,
            replacer,
        }
    }
}
