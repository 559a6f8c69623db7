use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use logpanel_types::SourceKind;

use crate::{Result, read_json, write_json};

/// Shared key-value store for panel state, backed by one JSON object file
///
/// Clones share the same in-memory map, so sources running on different
/// tasks never overwrite each other's keys.
#[derive(Clone, Debug)]
pub struct PanelStateStore {
    path: PathBuf,
    values: Arc<Mutex<Map<String, Value>>>,
}

impl PanelStateStore {
    /// Open the store, loading whatever is on disk
    pub fn open(path: PathBuf) -> Self {
        let values: Map<String, Value> = read_json(&path).unwrap_or_default();
        Self {
            path,
            values: Arc::new(Mutex::new(values)),
        }
    }

    /// `<dir>/panel_state.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join("panel_state.json"))
    }

    /// Key under which a source's panel state is stored
    pub fn key_for(kind: SourceKind) -> String {
        format!("{}_panel_state", kind)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned().filter(|v| !v.is_null())
    }

    /// Store `value` under `key` and persist the whole map
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        write_json(&self.path, &*values)
    }
}
