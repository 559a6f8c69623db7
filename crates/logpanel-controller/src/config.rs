//! Runtime configuration.
//!
//! Loaded from a TOML file; every key is optional.
//!
//! ```text
//! Key                     Default
//! ─────────────────────── ─────────────────────────────────────────────
//! client_log_path         ""            (glob pattern, resolved once)
//! server_log_path         ""            (glob pattern, resolved once)
//! quick_search_keywords   ["all_succ", "traceback"]
//! quick_search_colors     six hex colours
//! refresh_interval_ms     200           (flush and search refresh cadence)
//! max_search_results      100
//! tail_lines              1000          (rolling view size)
//! context_lines           500           (lines each side of a jump target)
//! max_history             1000
//! workspace_roots         []            (searched by jumpToFile)
//! watch_mode              "native"      ("native" | "poll")
//! backfill                false         (reload from cleared offsets on start)
//! storage_dir             <data dir>/logpanel
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use logpanel_types::{SourceKind, WatchMode};

use crate::error::{Error, Result};

/// Lower bound for the flush/refresh cadence
const MIN_REFRESH_INTERVAL_MS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_log_path: String,
    pub server_log_path: String,
    pub quick_search_keywords: Vec<String>,
    pub quick_search_colors: Vec<String>,
    pub refresh_interval_ms: u64,
    pub max_search_results: usize,
    pub tail_lines: usize,
    pub context_lines: usize,
    pub max_history: usize,
    pub workspace_roots: Vec<PathBuf>,
    pub watch_mode: WatchMode,
    pub backfill: bool,
    pub storage_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_log_path: String::new(),
            server_log_path: String::new(),
            quick_search_keywords: vec!["all_succ".to_string(), "traceback".to_string()],
            quick_search_colors: ["#4CAF50", "#FF9800", "#E91E63", "#2196F3", "#9C27B0", "#FF5722"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            refresh_interval_ms: 200,
            max_search_results: logpanel_logs::DEFAULT_MAX_MATCHES,
            tail_lines: 1000,
            context_lines: 500,
            max_history: logpanel_state::DEFAULT_MAX_HISTORY,
            workspace_roots: Vec::new(),
            watch_mode: WatchMode::default(),
            backfill: false,
            storage_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(Error::ConfigRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn log_path(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Client => &self.client_log_path,
            SourceKind::Server => &self.server_log_path,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(MIN_REFRESH_INTERVAL_MS))
    }

    /// Directory holding history, cleared offsets and panel state
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage_dir {
            return dir.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("logpanel"))
            .unwrap_or_else(|| PathBuf::from(".logpanel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.refresh_interval(), Duration::from_millis(200));
        assert_eq!(config.quick_search_colors.len(), 6);
    }

    #[test]
    fn test_partial_file_overrides() {
        let config: Config = toml::from_str(
            r#"
            client_log_path = "/tmp/client.log"
            server_log_path = "/tmp/server/*.log"
            quick_search_keywords = ["error"]
            watch_mode = "poll"
            refresh_interval_ms = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.log_path(SourceKind::Client), "/tmp/client.log");
        assert_eq!(config.log_path(SourceKind::Server), "/tmp/server/*.log");
        assert_eq!(config.quick_search_keywords, vec!["error".to_string()]);
        assert_eq!(config.watch_mode, WatchMode::Poll);
        assert_eq!(config.refresh_interval(), Duration::from_millis(10));
        assert_eq!(config.tail_lines, 1000);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "tail_lines = \"many\"").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_explicit_storage_dir() {
        let config = Config {
            storage_dir: Some(PathBuf::from("/srv/state")),
            ..Config::default()
        };
        assert_eq!(config.storage_dir(), PathBuf::from("/srv/state"));
    }
}
