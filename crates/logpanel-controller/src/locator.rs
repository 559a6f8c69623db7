use std::path::{Component, Path, PathBuf};

use logpanel_types::JumpTarget;

const SKIPPED_DIR: &str = "node_modules";

/// Resolves file references from log lines to files under the workspace roots
#[derive(Clone, Debug, Default)]
pub struct FileLocator {
    roots: Vec<PathBuf>,
}

impl FileLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Find the file a jump target refers to.
    ///
    /// Order: an existing full path, then a directory-qualified reference
    /// matched as a path suffix, then an exact file name match under any root,
    /// then the first file whose name contains the requested name.
    pub fn locate(&self, target: &JumpTarget) -> Option<PathBuf> {
        if let Some(full) = target.full_path.as_deref().filter(|p| !p.is_empty()) {
            let path = PathBuf::from(full);
            if path.is_file() {
                return Some(path);
            }
        }

        let reference = target.file_name.trim().trim_start_matches("./");
        let name = file_name_of(reference)?;
        let escaped = glob::Pattern::escape(name);

        if reference != name {
            let suffix = escape_components(reference);
            if let Some(found) = self.first_match(&format!("**/{}", suffix)) {
                return Some(found);
            }
        }

        self.first_match(&format!("**/{}", escaped))
            .or_else(|| self.first_match(&format!("**/*{}*", escaped)))
    }

    fn first_match(&self, relative: &str) -> Option<PathBuf> {
        for root in &self.roots {
            let root_pattern = glob::Pattern::escape(&root.to_string_lossy());
            let pattern = format!("{}/{}", root_pattern.trim_end_matches('/'), relative);

            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "Invalid file search pattern");
                    continue;
                }
            };

            let found = entries
                .filter_map(|entry| entry.ok())
                .find(|path| path.is_file() && !in_skipped_dir(path));
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

/// Last path component of a reference like `src/app/module.py`
fn file_name_of(reference: &str) -> Option<&str> {
    let trimmed = reference.trim();
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
}

/// Escape each component of a relative reference for use in a glob
fn escape_components(reference: &str) -> String {
    reference
        .split(['/', '\\'])
        .filter(|c| !c.is_empty() && *c != ".")
        .map(glob::Pattern::escape)
        .collect::<Vec<_>>()
        .join("/")
}

fn in_skipped_dir(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(name) if name == SKIPPED_DIR))
}
