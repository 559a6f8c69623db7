use std::collections::HashSet;
use std::path::{Path, PathBuf};

use logpanel_types::SourceKind;

use crate::{Result, read_json, write_json};

/// Default cap on persisted search history entries
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Search history for one source, stored as a JSON array of strings
#[derive(Clone, Debug)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
}

impl HistoryStore {
    pub fn new(path: PathBuf, max_entries: usize) -> Self {
        Self { path, max_entries }
    }

    /// `<dir>/<source>_searchHistory.json`
    pub fn for_source(dir: &Path, kind: SourceKind, max_entries: usize) -> Self {
        Self::new(dir.join(format!("{}_searchHistory.json", kind)), max_entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history; a missing or malformed file loads as empty
    pub fn load(&self) -> Vec<String> {
        let history: Vec<String> = read_json(&self.path).unwrap_or_default();
        tracing::debug!(
            path = %self.path.display(),
            entries = history.len(),
            "Loaded search history"
        );
        history
    }

    /// Most recent entry, if any
    pub fn last(&self) -> Option<String> {
        self.load().pop()
    }

    /// Deduplicate, cap and persist `entries`; returns what was written
    pub fn save(&self, entries: &[String]) -> Result<Vec<String>> {
        let history = dedupe_history(entries, self.max_entries);
        write_json(&self.path, &history)?;
        Ok(history)
    }
}

/// Keep the first occurrence of each entry, then the newest `max_entries`
pub fn dedupe_history(entries: &[String], max_entries: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let unique: Vec<String> = entries
        .iter()
        .filter(|e| seen.insert(e.as_str()))
        .cloned()
        .collect();

    let skip = unique.len().saturating_sub(max_entries);
    unique.into_iter().skip(skip).collect()
}
