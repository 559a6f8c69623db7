use std::sync::Arc;

use parking_lot::RwLock;

use logpanel_types::{ArcLogLine, LogLine, LogWindow, content_prefix};

/// Append-only, index-addressed buffer of every line ingested for one source
///
/// Clones share storage. The owning controller is the only writer; any clone
/// may take snapshots for searching or rendering.
#[derive(Clone, Default)]
pub struct LogBuffer {
    /// Internal storage - Arc<LogLine> keeps snapshots cheap
    lines: Arc<RwLock<Vec<ArcLogLine>>>,
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one already-ordered batch
    pub fn append(&self, batch: Vec<LogLine>) {
        if batch.is_empty() {
            return;
        }
        let mut lines = self.lines.write();
        lines.reserve(batch.len());
        lines.extend(batch.into_iter().map(Arc::new));
    }

    /// Total line count
    pub fn len(&self) -> usize {
        self.lines.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<ArcLogLine> {
        self.lines.read().get(index).cloned()
    }

    /// Drop every line; indices restart at 0
    pub fn clear(&self) {
        self.lines.write().clear();
    }

    /// Frozen copy of the whole buffer (Arc clones are just refcount bumps)
    pub fn snapshot(&self) -> Vec<ArcLogLine> {
        self.lines.read().clone()
    }

    /// Get the last N lines
    pub fn tail(&self, n: usize) -> Vec<ArcLogLine> {
        let lines = self.lines.read();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }

    /// Lines around `index`: up to `context` before and `context` after, clipped
    pub fn window(&self, index: usize, context: usize) -> Option<LogWindow> {
        let lines = self.lines.read();
        if index >= lines.len() {
            return None;
        }
        let start = index.saturating_sub(context);
        let end = index.saturating_add(context).min(lines.len() - 1);

        Some(LogWindow {
            start,
            lines: lines[start..=end].to_vec(),
            target: index - start,
        })
    }

    /// First index whose content prefix equals `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Option<usize> {
        self.lines
            .read()
            .iter()
            .position(|l| l.content_prefix() == prefix)
    }

    /// Map a possibly stale index to the line the caller meant.
    ///
    /// The index is trusted when it is in bounds and, if a prefix was given,
    /// the line there still carries it. Otherwise the buffer is scanned for the
    /// prefix.
    pub fn resolve_index(&self, index: i64, prefix: Option<&str>) -> Option<usize> {
        let in_bounds = usize::try_from(index).ok().filter(|i| *i < self.len());

        match (in_bounds, prefix) {
            (Some(i), None) => Some(i),
            (Some(i), Some(p)) => {
                let matches = self
                    .get(i)
                    .is_some_and(|line| content_prefix(&line.raw) == p);
                if matches { Some(i) } else { self.find_by_prefix(p) }
            }
            (None, Some(p)) => self.find_by_prefix(p),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> LogBuffer {
        let buffer = LogBuffer::new();
        buffer.append(
            (0..n)
                .map(|i| LogLine::new(format!("line {}", i), None))
                .collect(),
        );
        buffer
    }

    #[test]
    fn test_append_and_tail() {
        let buffer = filled(1500);
        assert_eq!(buffer.len(), 1500);

        let tail = buffer.tail(1000);
        assert_eq!(tail.len(), 1000);
        assert_eq!(tail[0].raw, "line 500");
        assert_eq!(tail[999].raw, "line 1499");

        assert_eq!(filled(3).tail(1000).len(), 3);
    }

    #[test]
    fn test_window_in_middle() {
        let buffer = filled(1200);
        let window = buffer.window(1000, 500).unwrap();

        assert_eq!(window.start, 500);
        assert_eq!(window.lines.len(), 700);
        assert_eq!(window.target, 500);
        assert_eq!(window.lines.last().unwrap().raw, "line 1199");
    }

    #[test]
    fn test_window_length_formula() {
        let n = 1200;
        let buffer = filled(n);
        for k in [0, 1, 499, 500, 501, 699, 700, 1199] {
            let window = buffer.window(k, 500).unwrap();
            let expected = k.min(500) + 500.min(n - 1 - k) + 1;
            assert_eq!(window.lines.len(), expected, "k = {}", k);
            assert_eq!(window.target, k.min(500), "k = {}", k);
            assert_eq!(window.lines[window.target].raw, format!("line {}", k));
        }
    }

    #[test]
    fn test_window_out_of_bounds() {
        assert!(filled(10).window(10, 500).is_none());
        assert!(LogBuffer::new().window(0, 500).is_none());
    }

    #[test]
    fn test_clear_restarts_indices() {
        let buffer = filled(5);
        buffer.clear();
        assert!(buffer.is_empty());

        buffer.append(vec![LogLine::new("fresh".to_string(), None)]);
        assert_eq!(buffer.get(0).unwrap().raw, "fresh");
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let buffer = filled(3);
        let snapshot = buffer.snapshot();
        buffer.append(vec![LogLine::new("later".to_string(), None)]);

        assert_eq!(snapshot.len(), 3);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_resolve_index_trusts_matching_line() {
        let buffer = filled(100);
        assert_eq!(buffer.resolve_index(50, Some("line 50")), Some(50));
        assert_eq!(buffer.resolve_index(50, None), Some(50));
    }

    #[test]
    fn test_resolve_index_follows_prefix() {
        let buffer = filled(100);
        // Content that was at 50 now lives at 80
        assert_eq!(buffer.resolve_index(50, Some("line 80")), Some(80));
        assert_eq!(buffer.resolve_index(500, Some("line 80")), Some(80));
        assert_eq!(buffer.resolve_index(-1, Some("line 3")), Some(3));
    }

    #[test]
    fn test_resolve_index_unresolvable() {
        let buffer = filled(10);
        assert_eq!(buffer.resolve_index(50, Some("missing")), None);
        assert_eq!(buffer.resolve_index(5, Some("missing")), None);
        assert_eq!(buffer.resolve_index(50, None), None);
        assert_eq!(buffer.resolve_index(-3, None), None);
    }
}
