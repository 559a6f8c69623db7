//! Durable state for logpanel
//!
//! Search history and cleared offsets live in one JSON file per source;
//! panel state is a shared JSON key-value file. Reads never fail: a missing
//! or corrupt file loads as empty.

mod cleared;
mod error;
mod history;
mod panel;

pub use cleared::ClearedOffsetStore;
pub use error::{Result, StateError};
pub use history::{DEFAULT_MAX_HISTORY, HistoryStore, dedupe_history};
pub use panel::PanelStateStore;

use std::fs;
use std::path::Path;

use serde::Serialize;

/// Pretty-print `value` to `path`, creating parent directories
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}

/// Read and parse `path`; missing files and bad JSON yield `None`
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "State file does not exist yet");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read state file");
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Malformed state file, using defaults"
            );
            None
        }
    }
}
