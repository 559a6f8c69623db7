use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use logpanel_logs::{
    CompiledSearch, LogBuffer, QuickCounters, TailOutcome, TailReader, TimestampSorter,
};
use logpanel_state::{ClearedOffsetStore, HistoryStore, PanelStateStore};
use logpanel_types::{JumpTarget, LogWindow, Push, Request, SearchMatch, SourceKind};

use crate::config::Config;
use crate::error::Result;
use crate::locator::FileLocator;
use crate::surface::Surface;

/// Tunables for one source
#[derive(Clone, Debug)]
pub struct ControllerOptions {
    /// Lines shown in the rolling tail view
    pub tail_lines: usize,
    /// Lines on each side of a jump target
    pub context_lines: usize,
    pub max_search_results: usize,
    pub quick_search_keywords: Vec<String>,
    pub quick_search_colors: Vec<String>,
    /// Reload content past the cleared offsets on start instead of skipping it
    pub backfill: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ControllerOptions {
    fn from(config: &Config) -> Self {
        Self {
            tail_lines: config.tail_lines,
            context_lines: config.context_lines,
            max_search_results: config.max_search_results,
            quick_search_keywords: config.quick_search_keywords.clone(),
            quick_search_colors: config.quick_search_colors.clone(),
            backfill: config.backfill,
        }
    }
}

/// Durable stores used by one source
#[derive(Clone, Debug)]
pub struct SourceStores {
    pub history: HistoryStore,
    pub cleared: ClearedOffsetStore,
    pub panel: PanelStateStore,
}

impl SourceStores {
    /// Per-source files in `dir`, plus the shared panel state store
    pub fn in_dir(
        dir: &Path,
        kind: SourceKind,
        max_history: usize,
        panel: PanelStateStore,
    ) -> Self {
        Self {
            history: HistoryStore::for_source(dir, kind, max_history),
            cleared: ClearedOffsetStore::for_source(dir, kind),
            panel,
        }
    }
}

/// State machine for one log source.
///
/// Owns the tail reader, the buffer, the pending queue, the counters and the
/// active search. Every mutation goes through `&mut self`, so a single owner
/// (see [`spawn_source`](crate::spawn_source)) serializes file changes,
/// flushes, refreshes and requests.
pub struct LogSourceController {
    kind: SourceKind,
    options: ControllerOptions,
    tail: TailReader,
    buffer: LogBuffer,

    /// Raw lines read from files, waiting for the next flush
    pending: Vec<String>,

    counters: QuickCounters,

    /// Active search, re-run on every refresh tick
    search: Option<CompiledSearch>,

    /// Buffer index the view is pinned to; the tail view is not pushed while set
    pinned: Option<usize>,

    stores: SourceStores,
    locator: FileLocator,
    panel_key: String,
    surface: Option<Arc<dyn Surface>>,
}

impl LogSourceController {
    pub fn new(
        kind: SourceKind,
        paths: Vec<PathBuf>,
        options: ControllerOptions,
        stores: SourceStores,
        locator: FileLocator,
    ) -> Result<Self> {
        let cleared = stores.cleared.load();
        let counters = QuickCounters::new(&options.quick_search_keywords)?;

        // Resume the most recent query as a plain case-insensitive search
        let search = stores
            .history
            .last()
            .filter(|q| !q.trim().is_empty())
            .and_then(|q| CompiledSearch::new(&q, false, false).ok());

        let mut controller = Self {
            kind,
            tail: TailReader::new(paths, &cleared),
            buffer: LogBuffer::new(),
            pending: Vec::new(),
            counters,
            search,
            pinned: None,
            panel_key: PanelStateStore::key_for(kind),
            stores,
            locator,
            surface: None,
            options,
        };

        if controller.options.backfill {
            controller.poll_files();
            controller.flush();
        } else {
            controller.tail.prime();
        }

        tracing::info!(
            source = %kind,
            files = controller.tail.paths().len(),
            lines = controller.buffer.len(),
            "Log source ready"
        );

        Ok(controller)
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn paths(&self) -> &[PathBuf] {
        self.tail.paths()
    }

    /// Shared handle to the buffer
    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn pinned(&self) -> Option<usize> {
        self.pinned
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn search_active(&self) -> bool {
        self.search.is_some()
    }

    pub fn active_search(&self) -> Option<&CompiledSearch> {
        self.search.as_ref()
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.counters.counts()
    }

    /// Connect a presentation surface and bring it up to date
    pub fn attach(&mut self, surface: Arc<dyn Surface>) {
        tracing::debug!(source = %self.kind, "Surface attached");
        self.surface = Some(surface);

        self.push_tail();
        let snapshot = self.buffer.snapshot();
        self.counters.recompute(snapshot.iter().map(|l| &**l));
        self.push_counts();
        self.push_history();
        self.replay_state();
    }

    pub fn detach(&mut self) {
        self.surface = None;
    }

    /// Read new content from `path` into the pending queue
    pub fn on_file_change(&mut self, path: &Path) {
        match self.tail.poll(path) {
            Ok(TailOutcome::Appended(lines)) => {
                if !lines.is_empty() {
                    tracing::trace!(
                        source = %self.kind,
                        path = %path.display(),
                        lines = lines.len(),
                        "Read appended lines"
                    );
                    self.pending.extend(lines);
                }
            }
            Ok(TailOutcome::Truncated { .. }) => self.persist_cleared(),
            Ok(TailOutcome::Unchanged | TailOutcome::Missing) => {}
            Err(e) => {
                tracing::warn!(
                    source = %self.kind,
                    path = %path.display(),
                    error = %e,
                    "Failed to read log file"
                );
            }
        }
    }

    /// Check every file once (poll mode and backfill)
    pub fn poll_files(&mut self) {
        let paths = self.tail.paths().to_vec();
        for path in paths {
            self.on_file_change(&path);
        }
    }

    /// Sort the pending queue into the buffer and notify the surface
    pub fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let batch = TimestampSorter::sort_batch(std::mem::take(&mut self.pending));
        let added = batch.len();
        self.counters.observe(&batch);
        self.buffer.append(batch);

        tracing::debug!(source = %self.kind, added, total = self.buffer.len(), "Flushed batch");

        self.push_counts();
        if self.pinned.is_none() {
            self.push_tail();
        }
    }

    /// Dispatch one request from the surface
    pub fn handle(&mut self, request: Request) {
        tracing::debug!(source = %self.kind, request = request.kind(), "Handling request");

        match request {
            Request::SearchLog {
                query,
                regex,
                case_sensitive,
            } => self.search_log(&query, regex, case_sensitive),
            Request::GetLogByIndex {
                index,
                content_hash,
            } => {
                let hash = content_hash.as_deref().filter(|h| !h.is_empty());
                self.get_window(index, hash);
            }
            Request::ClearLog => self.clear(),
            Request::UpdateHistory { payload } => self.update_history(&payload),
            Request::UpdatePanelState { payload } => self.update_panel_state(payload),
            Request::GetStateRequest => self.replay_state(),
            Request::GetHistoryRequest => self.push_history(),
            Request::JumpToFile { payload } => self.jump_to_file(&payload),
            Request::Unknown => {
                tracing::warn!(source = %self.kind, "Ignoring unknown request type");
            }
        }
    }

    /// Run a query against the current buffer without touching session state
    pub fn search(
        &self,
        query: &str,
        is_regex: bool,
        case_sensitive: bool,
    ) -> logpanel_logs::Result<Vec<SearchMatch>> {
        let search = CompiledSearch::new(query, is_regex, case_sensitive)?;
        Ok(search.search(&self.buffer.snapshot(), self.options.max_search_results))
    }

    /// Start, replace or (with an empty query) stop the active search
    pub fn search_log(&mut self, query: &str, is_regex: bool, case_sensitive: bool) {
        if query.trim().is_empty() {
            self.search = None;
            self.pinned = None;
            self.post(Push::SearchResult {
                payload: Vec::new(),
            });
            return;
        }

        match CompiledSearch::new(query, is_regex, case_sensitive) {
            Ok(search) => {
                let payload =
                    search.search(&self.buffer.snapshot(), self.options.max_search_results);
                tracing::debug!(
                    source = %self.kind,
                    query,
                    matches = payload.len(),
                    "Search started"
                );
                self.search = Some(search);
                self.post(Push::SearchResult { payload });
            }
            Err(e) => {
                tracing::debug!(source = %self.kind, query, error = %e, "Rejected search pattern");
                self.search = None;
                self.post(Push::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Re-run the active search and redeliver the full match set
    pub fn refresh_search(&mut self) {
        if self.surface.is_none() {
            return;
        }
        let Some(search) = &self.search else {
            return;
        };

        let payload = search.search(&self.buffer.snapshot(), self.options.max_search_results);
        self.post(Push::SearchResult { payload });
    }

    /// Pin the view to a line and push the window around it.
    ///
    /// `content_hash` corrects a stale index; an unresolvable request is a
    /// no-op and returns `None`.
    pub fn get_window(&mut self, index: i64, content_hash: Option<&str>) -> Option<LogWindow> {
        let Some(resolved) = self.buffer.resolve_index(index, content_hash) else {
            tracing::debug!(source = %self.kind, index, "Requested line not found");
            return None;
        };
        if resolved as i64 != index {
            tracing::debug!(source = %self.kind, index, resolved, "Corrected stale line index");
        }

        let window = self.buffer.window(resolved, self.options.context_lines)?;
        self.pinned = Some(resolved);
        self.post(Push::Log {
            lines: window.raw_lines(),
            target_line_index: Some(window.target),
        });
        Some(window)
    }

    /// Forget everything shown so far, durably
    pub fn clear(&mut self) {
        let offsets = self.tail.clear();
        if let Err(e) = self.stores.cleared.save(&offsets) {
            tracing::warn!(source = %self.kind, error = %e, "Failed to persist cleared offsets");
        }

        self.buffer.clear();
        self.pending.clear();
        self.counters.reset();

        tracing::info!(source = %self.kind, "Log cleared");

        self.post(Push::Log {
            lines: Vec::new(),
            target_line_index: None,
        });
        self.push_counts();
    }

    pub fn update_history(&mut self, entries: &[String]) {
        match self.stores.history.save(entries) {
            Ok(saved) => {
                tracing::debug!(source = %self.kind, entries = saved.len(), "History saved")
            }
            Err(e) => tracing::warn!(source = %self.kind, error = %e, "Failed to save history"),
        }
    }

    pub fn update_panel_state(&mut self, payload: Value) {
        if let Err(e) = self.stores.panel.set(&self.panel_key, payload) {
            tracing::warn!(source = %self.kind, error = %e, "Failed to save panel state");
        }
    }

    /// Replay cached panel state, then re-send the current view
    pub fn replay_state(&mut self) {
        if let Some(state) = self.stores.panel.get(&self.panel_key) {
            self.restore_search(&state);
            self.post(Push::RestorePanelState { payload: state });
        }

        match self.pinned_window() {
            Some(window) => self.post(Push::Log {
                lines: window.raw_lines(),
                target_line_index: Some(window.target),
            }),
            None => self.push_tail(),
        }
    }

    pub fn push_history(&mut self) {
        let history = self.stores.history.load();
        self.post(Push::History { history });
    }

    pub fn jump_to_file(&mut self, target: &JumpTarget) {
        match self.locator.locate(target) {
            Some(path) => {
                tracing::debug!(
                    source = %self.kind,
                    path = %path.display(),
                    line = target.line_number,
                    "Resolved file reference"
                );
                self.post(Push::OpenFile {
                    path: path.to_string_lossy().into_owned(),
                    line_number: target.line_number,
                });
            }
            None => {
                self.post(Push::Error {
                    message: format!("Cannot find file: {}", target.file_name),
                });
            }
        }
    }

    /// Re-activate the search saved in panel state, if any
    fn restore_search(&mut self, state: &Value) {
        let Some(query) = state
            .get("searchText")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
        else {
            return;
        };
        let is_regex = state.get("regex").and_then(Value::as_bool).unwrap_or(false);
        let case_sensitive = state
            .get("caseSensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        match CompiledSearch::new(query, is_regex, case_sensitive) {
            Ok(search) => self.search = Some(search),
            Err(e) => {
                tracing::debug!(
                    source = %self.kind,
                    query,
                    error = %e,
                    "Saved search is not a valid pattern"
                )
            }
        }
    }

    fn pinned_window(&self) -> Option<LogWindow> {
        self.pinned
            .and_then(|i| self.buffer.window(i, self.options.context_lines))
    }

    fn push_tail(&self) {
        let lines = self
            .buffer
            .tail(self.options.tail_lines)
            .into_iter()
            .map(|l| l.raw.clone())
            .collect();
        self.post(Push::Log {
            lines,
            target_line_index: None,
        });
    }

    fn push_counts(&self) {
        if self.counters.is_empty() {
            return;
        }
        self.post(Push::UpdateQuickSearchCounts {
            payload: self.counters.counts(),
            colors: self.options.quick_search_colors.clone(),
        });
    }

    fn persist_cleared(&self) {
        if let Err(e) = self.stores.cleared.save(&self.tail.cleared_offsets()) {
            tracing::warn!(source = %self.kind, error = %e, "Failed to persist cleared offsets");
        }
    }

    fn post(&self, push: Push) {
        if let Some(surface) = &self.surface {
            surface.post(push);
        }
    }
}
