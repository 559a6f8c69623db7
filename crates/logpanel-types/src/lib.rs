//! Shared types for logpanel
//!
//! This crate contains the log line model and the message protocol spoken
//! between a presentation surface and a log source controller.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Number of characters used as a line's identity check across requests
pub const CONTENT_PREFIX_CHARS: usize = 100;

// ============================================================================
// Log Source Types
// ============================================================================

/// Logical log source served by one controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Client,
    Server,
}

impl SourceKind {
    pub const ALL: [SourceKind; 2] = [SourceKind::Client, SourceKind::Server];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }

    /// Parse a source name as sent over the wire
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "client" => Some(Self::Client),
            "server" => Some(Self::Server),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How file changes are detected
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Operating system notifications
    #[default]
    Native,
    /// Periodic metadata polling
    Poll,
}

// ============================================================================
// Log Types
// ============================================================================

/// A single ingested log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// Original raw text, without its line terminator
    pub raw: String,

    /// Leading timestamp, if the line starts with one
    pub timestamp: Option<NaiveDateTime>,
}

impl LogLine {
    pub fn new(raw: String, timestamp: Option<NaiveDateTime>) -> Self {
        Self { raw, timestamp }
    }

    /// Chronological sort key in microseconds; lines without a timestamp sort as 0
    pub fn sort_key(&self) -> i64 {
        self.timestamp
            .map(|ts| ts.and_utc().timestamp_micros())
            .unwrap_or(0)
    }

    /// Identity prefix used to detect buffer drift between requests
    pub fn content_prefix(&self) -> &str {
        content_prefix(&self.raw)
    }
}

/// Shared handle to a buffered line, cheap to clone into snapshots
pub type ArcLogLine = Arc<LogLine>;

/// First [`CONTENT_PREFIX_CHARS`] characters of `text`
pub fn content_prefix(text: &str) -> &str {
    match text.char_indices().nth(CONTENT_PREFIX_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// One search hit, addressed by buffer index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub index: usize,
    pub content: String,
    pub content_hash: String,
}

impl SearchMatch {
    pub fn new(index: usize, line: &LogLine) -> Self {
        Self {
            index,
            content: line.raw.clone(),
            content_hash: line.content_prefix().to_string(),
        }
    }
}

/// A slice of the buffer centred on one line
#[derive(Clone, Debug)]
pub struct LogWindow {
    /// Buffer index of the first line in `lines`
    pub start: usize,

    /// Lines in buffer order
    pub lines: Vec<ArcLogLine>,

    /// Position of the requested line within `lines`
    pub target: usize,
}

impl LogWindow {
    pub fn raw_lines(&self) -> Vec<String> {
        self.lines.iter().map(|l| l.raw.clone()).collect()
    }
}

// ============================================================================
// Message Protocol
// ============================================================================

/// File reference sent by the surface for "jump to file"
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JumpTarget {
    pub file_name: String,
    pub line_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_path: Option<String>,
}

/// Requests sent from the presentation surface to a controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    #[serde(rename_all = "camelCase")]
    SearchLog {
        query: String,
        #[serde(default)]
        regex: bool,
        #[serde(default)]
        case_sensitive: bool,
    },
    #[serde(rename_all = "camelCase")]
    GetLogByIndex {
        index: i64,
        #[serde(default)]
        content_hash: Option<String>,
    },
    ClearLog,
    UpdateHistory {
        payload: Vec<String>,
    },
    UpdatePanelState {
        #[serde(default)]
        payload: serde_json::Value,
    },
    GetStateRequest,
    GetHistoryRequest,
    JumpToFile {
        payload: JumpTarget,
    },
    /// Any tag this protocol does not know
    #[serde(other)]
    Unknown,
}

impl Request {
    /// Wire tag of this request
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchLog { .. } => "searchLog",
            Self::GetLogByIndex { .. } => "getLogByIndex",
            Self::ClearLog => "clearLog",
            Self::UpdateHistory { .. } => "updateHistory",
            Self::UpdatePanelState { .. } => "updatePanelState",
            Self::GetStateRequest => "getStateRequest",
            Self::GetHistoryRequest => "getHistoryRequest",
            Self::JumpToFile { .. } => "jumpToFile",
            Self::Unknown => "unknown",
        }
    }
}

/// Notifications pushed from a controller to the presentation surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Push {
    #[serde(rename_all = "camelCase")]
    Log {
        lines: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_line_index: Option<usize>,
    },
    History {
        history: Vec<String>,
    },
    SearchResult {
        payload: Vec<SearchMatch>,
    },
    UpdateQuickSearchCounts {
        payload: BTreeMap<String, usize>,
        colors: Vec<String>,
    },
    RestorePanelState {
        payload: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    OpenFile {
        path: String,
        line_number: u32,
    },
    Error {
        message: String,
    },
}
