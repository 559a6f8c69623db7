use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Read bookkeeping for one watched file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TailState {
    /// File size at the last observation
    pub last_size: u64,

    /// End of the last complete line consumed; trails `last_size` while an
    /// unterminated fragment is waiting for its newline
    pub read_offset: u64,

    /// Content before this offset was cleared by the user
    pub cleared_offset: u64,
}

impl TailState {
    /// Offset the next read starts from
    pub fn read_origin(&self) -> u64 {
        self.read_offset.max(self.cleared_offset)
    }

    /// Size below which the file counts as truncated
    pub fn known_size(&self) -> u64 {
        self.last_size.max(self.cleared_offset)
    }

    fn skip_to(&mut self, size: u64) {
        self.last_size = size;
        self.read_offset = size;
    }
}

/// Result of observing a change on one file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TailOutcome {
    /// Complete lines appended since the last read, in file order
    Appended(Vec<String>),
    /// File shrank below its last observed size
    Truncated { new_size: u64 },
    /// Nothing new to read
    Unchanged,
    /// File does not exist right now
    Missing,
}

/// Incremental reader over a fixed set of files
///
/// Only the byte range appended since the previous read is read; files are
/// opened per read and never held open between calls.
#[derive(Debug, Default)]
pub struct TailReader {
    states: HashMap<PathBuf, TailState>,
    /// Resolution order, kept for deterministic iteration
    paths: Vec<PathBuf>,
}

impl TailReader {
    /// Create a reader with persisted cleared offsets; read positions start at 0
    pub fn new(paths: Vec<PathBuf>, cleared: &BTreeMap<PathBuf, u64>) -> Self {
        let states = paths
            .iter()
            .map(|p| {
                let state = TailState {
                    cleared_offset: cleared.get(p).copied().unwrap_or(0),
                    ..TailState::default()
                };
                (p.clone(), state)
            })
            .collect();

        Self { states, paths }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn state(&self, path: &Path) -> Option<TailState> {
        self.states.get(path).copied()
    }

    /// Skip existing content: move every read position to the current file end
    pub fn prime(&mut self) {
        for (path, state) in self.states.iter_mut() {
            if let Some(size) = file_size(path) {
                state.skip_to(size);
            }
        }
    }

    /// Read whatever was appended to `path` since the previous read
    pub fn poll(&mut self, path: &Path) -> Result<TailOutcome> {
        let Some(state) = self.states.get_mut(path) else {
            return Ok(TailOutcome::Unchanged);
        };

        let Some(new_size) = file_size(path) else {
            return Ok(TailOutcome::Missing);
        };

        let old_size = state.known_size();

        if new_size < old_size {
            tracing::info!(
                path = %path.display(),
                old_size,
                new_size,
                "File truncated, resetting read position"
            );
            state.skip_to(new_size);
            state.cleared_offset = 0;
            return Ok(TailOutcome::Truncated { new_size });
        }

        let origin = state.read_origin();
        if new_size == old_size || new_size == origin {
            return Ok(TailOutcome::Unchanged);
        }

        let bytes = match read_range(path, origin, new_size - origin) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(TailOutcome::Missing),
            Err(e) => return Err(e.into()),
        };
        state.last_size = new_size;

        // An unterminated trailing fragment stays unread until its newline lands
        let Some(last_newline) = bytes.iter().rposition(|b| *b == b'\n') else {
            return Ok(TailOutcome::Appended(Vec::new()));
        };
        let complete = &bytes[..=last_newline];
        state.read_offset = origin + complete.len() as u64;

        Ok(TailOutcome::Appended(split_lines(complete)))
    }

    /// Read every watched file once, in resolution order
    pub fn poll_all(&mut self) -> Vec<(PathBuf, Result<TailOutcome>)> {
        let paths = self.paths.clone();
        paths
            .into_iter()
            .map(|p| {
                let outcome = self.poll(&p);
                (p, outcome)
            })
            .collect()
    }

    /// Mark all current content as cleared and return the offsets to persist
    pub fn clear(&mut self) -> BTreeMap<PathBuf, u64> {
        for (path, state) in self.states.iter_mut() {
            if let Some(size) = file_size(path) {
                state.skip_to(size);
                state.cleared_offset = size;
            }
        }
        self.cleared_offsets()
    }

    /// Current cleared offsets, keyed by path
    pub fn cleared_offsets(&self) -> BTreeMap<PathBuf, u64> {
        self.states
            .iter()
            .map(|(p, s)| (p.clone(), s.cleared_offset))
            .collect()
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Point read of exactly `len` bytes at `offset`
fn read_range(path: &Path, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;
    Ok(buf)
}

/// Decode and split on line terminators, dropping empty lines
fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::io::Write;
    use tempfile::TempDir;

    fn append(path: &Path, text: &str) {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    fn lines(outcome: TailOutcome) -> Vec<String> {
        match outcome {
            TailOutcome::Appended(lines) => lines,
            other => panic!("expected appended lines, got {:?}", other),
        }
    }

    fn reader_for(path: &Path) -> TailReader {
        TailReader::new(vec![path.to_path_buf()], &BTreeMap::new())
    }

    #[test]
    fn test_reads_only_appended_range() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "old line\n");

        let mut reader = reader_for(&path);
        reader.prime();
        append(&path, "new 1\nnew 2\n");

        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["new 1", "new 2"]);
        assert_eq!(reader.state(&path).unwrap().last_size, 21);
    }

    #[test]
    fn test_poll_without_change_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "a\nb\n");

        let mut reader = reader_for(&path);
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["a", "b"]);
        assert_eq!(reader.poll(&path).unwrap(), TailOutcome::Unchanged);
        assert_eq!(reader.poll(&path).unwrap(), TailOutcome::Unchanged);
    }

    #[test]
    fn test_chunking_does_not_change_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let mut reader = reader_for(&path);

        let mut seen = Vec::new();
        for chunk in ["al", "pha\nbe", "ta\n", "\ngam", "ma\ndel"] {
            append(&path, chunk);
            seen.extend(lines(reader.poll(&path).unwrap()));
        }

        assert_eq!(seen, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_trailing_fragment_not_emitted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "done\npartial");

        let mut reader = reader_for(&path);
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["done"]);
        let state = reader.state(&path).unwrap();
        assert_eq!(state.last_size, 12);
        assert_eq!(state.read_offset, 5);
        assert_eq!(reader.poll(&path).unwrap(), TailOutcome::Unchanged);
    }

    #[test]
    fn test_truncation_detected_past_pending_fragment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "aaaa\nunterminated-fragment");

        let mut reader = reader_for(&path);
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["aaaa"]);

        // Rewritten shorter than before, but longer than the consumed prefix
        std::fs::write(&path, "new1\nnew22\n").unwrap();
        assert_eq!(
            reader.poll(&path).unwrap(),
            TailOutcome::Truncated { new_size: 11 }
        );
        let state = reader.state(&path).unwrap();
        assert_eq!(state.cleared_offset, 0);
        assert_eq!(state.read_origin(), 11);

        append(&path, "new333\n");
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["new333"]);
    }

    #[test]
    fn test_crlf_terminators() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "one\r\ntwo\r\n");

        let mut reader = reader_for(&path);
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["one", "two"]);
    }

    #[test]
    fn test_truncation_resets_cleared_offset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "0123456789\n");

        let mut cleared = BTreeMap::new();
        cleared.insert(path.clone(), 11);
        let mut reader = TailReader::new(vec![path.clone()], &cleared);

        std::fs::write(&path, "xy\n").unwrap();
        assert_eq!(
            reader.poll(&path).unwrap(),
            TailOutcome::Truncated { new_size: 3 }
        );
        let state = reader.state(&path).unwrap();
        assert_eq!(state.last_size, 3);
        assert_eq!(state.cleared_offset, 0);
    }

    #[test]
    fn test_clear_does_not_look_like_truncation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "before clear\n");

        let mut reader = reader_for(&path);
        lines(reader.poll(&path).unwrap());

        let offsets = reader.clear();
        assert_eq!(offsets.get(&path), Some(&13));
        assert_eq!(reader.poll(&path).unwrap(), TailOutcome::Unchanged);

        append(&path, "after clear\n");
        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["after clear"]);
    }

    #[test]
    fn test_cleared_offset_survives_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        append(&path, "hidden\nvisible\n");

        let mut cleared = BTreeMap::new();
        cleared.insert(path.clone(), 7);
        let mut reader = TailReader::new(vec![path.clone()], &cleared);

        assert_eq!(lines(reader.poll(&path).unwrap()), vec!["visible"]);
    }

    #[test]
    fn test_missing_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.log");

        let mut reader = reader_for(&path);
        assert_eq!(reader.poll(&path).unwrap(), TailOutcome::Missing);
        assert_eq!(reader.state(&path).unwrap(), TailState::default());
    }

    #[test]
    fn test_unwatched_path_is_ignored() {
        let dir = TempDir::new().unwrap();
        let watched = dir.path().join("a.log");
        let other = dir.path().join("b.log");
        append(&other, "x\n");

        let mut reader = reader_for(&watched);
        assert_eq!(reader.poll(&other).unwrap(), TailOutcome::Unchanged);
    }
}
