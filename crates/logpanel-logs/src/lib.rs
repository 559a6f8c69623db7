//! Log processing for logpanel
//!
//! This crate provides incremental file tailing, batch timestamp ordering,
//! the in-memory line buffer, search and keyword counters.

mod buffer;
mod counters;
mod error;
mod search;
mod tail;
mod timestamp;
mod watcher;

pub use buffer::LogBuffer;
pub use counters::QuickCounters;
pub use error::{Error, Result};
pub use search::{CompiledSearch, DEFAULT_MAX_MATCHES};
pub use tail::{TailOutcome, TailReader, TailState};
pub use timestamp::TimestampSorter;
pub use watcher::{FileWatcher, resolve_paths};

// Re-export types used in our public API
pub use logpanel_types::{ArcLogLine, LogLine, LogWindow, SearchMatch, WatchMode};
