use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use logpanel_types::SourceKind;

use crate::{Result, read_json, write_json};

/// Per-file cleared offsets for one source, stored as a JSON object of path to byte offset
#[derive(Clone, Debug)]
pub struct ClearedOffsetStore {
    path: PathBuf,
}

impl ClearedOffsetStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<dir>/<source>_cleared.json`
    pub fn for_source(dir: &Path, kind: SourceKind) -> Self {
        Self::new(dir.join(format!("{}_cleared.json", kind)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load offsets; a missing or malformed file loads as empty
    pub fn load(&self) -> BTreeMap<PathBuf, u64> {
        let raw: BTreeMap<String, u64> = read_json(&self.path).unwrap_or_default();
        raw.into_iter().map(|(k, v)| (PathBuf::from(k), v)).collect()
    }

    pub fn save(&self, offsets: &BTreeMap<PathBuf, u64>) -> Result<()> {
        let raw: BTreeMap<String, u64> = offsets
            .iter()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), *v))
            .collect();
        write_json(&self.path, &raw)?;
        tracing::debug!(path = %self.path.display(), files = raw.len(), "Saved cleared offsets");
        Ok(())
    }
}
