use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;

/// Expand a log path pattern into concrete file paths.
///
/// A literal path with no match is still returned, after creating its
/// parent directory, so the file is picked up once it appears.
pub fn resolve_paths(pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) => paths.push(path),
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable path"),
        }
    }

    if paths.is_empty() {
        tracing::warn!(pattern, "No files match log path");

        if !has_glob_meta(pattern) {
            let path = PathBuf::from(pattern);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(
                        dir = %parent.display(),
                        error = %e,
                        "Failed to create log directory"
                    );
                }
            }
            paths.push(path);
        }
    }

    tracing::debug!(pattern, files = paths.len(), "Resolved log paths");
    Ok(paths)
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Delivers operating-system change notifications for a fixed set of files
///
/// Parent directories are watched non-recursively and events are filtered to
/// the requested files. Dropping the watcher releases every registration.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    dirs: Vec<PathBuf>,
}

impl FileWatcher {
    /// Start watching `paths`, calling `on_change` with the configured path of
    /// every file that changes
    pub fn start<F>(paths: &[PathBuf], on_change: F) -> Result<Self>
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        let lookup = build_lookup(paths);

        let handler = move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for changed in &event.paths {
                    if let Some(configured) = lookup.get(changed) {
                        on_change(configured.clone());
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "File watch error"),
        };

        let mut watcher = RecommendedWatcher::new(handler, Config::default())?;

        let mut dirs = Vec::new();
        for dir in parent_dirs(paths) {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => dirs.push(dir),
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Cannot watch log directory")
                }
            }
        }

        tracing::info!(dirs = dirs.len(), files = paths.len(), "File watcher started");

        Ok(Self {
            _watcher: watcher,
            dirs,
        })
    }

    /// Directories currently registered
    pub fn watched_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// Map every spelling an event may use for a file back to the configured path
fn build_lookup(paths: &[PathBuf]) -> HashMap<PathBuf, PathBuf> {
    let mut lookup = HashMap::new();
    for path in paths {
        lookup.insert(path.clone(), path.clone());
        if let Ok(abs) = std::path::absolute(path) {
            lookup.insert(abs, path.clone());
        }
        if let (Some(parent), Some(name)) = (watch_dir(path), path.file_name()) {
            if let Ok(canonical) = parent.canonicalize() {
                lookup.insert(canonical.join(name), path.clone());
            }
        }
    }
    lookup
}

fn watch_dir(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

fn parent_dirs(paths: &[PathBuf]) -> BTreeSet<PathBuf> {
    paths.iter().filter_map(|p| watch_dir(p)).collect()
}
