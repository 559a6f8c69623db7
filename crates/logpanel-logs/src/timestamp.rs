use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;

use logpanel_types::LogLine;

/// Leading timestamp in the form `2024-01-15 10:30:00,123456`
static TIMESTAMP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{6}").expect("valid timestamp pattern")
});

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%6f";

/// Orders freshly read lines by their leading timestamp
pub struct TimestampSorter;

impl TimestampSorter {
    /// Extract the leading timestamp of a raw line
    pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
        let found = TIMESTAMP_PREFIX.find(raw)?;
        NaiveDateTime::parse_from_str(found.as_str(), TIMESTAMP_FORMAT).ok()
    }

    /// Parse a raw line into a LogLine
    pub fn parse(raw: String) -> LogLine {
        let timestamp = Self::parse_timestamp(&raw);
        LogLine::new(raw, timestamp)
    }

    /// Sort one batch ascending by timestamp.
    ///
    /// The sort is stable: lines with equal keys, including every line
    /// without a timestamp (key 0), keep their batch order.
    pub fn sort_batch(raw_lines: Vec<String>) -> Vec<LogLine> {
        let mut lines: Vec<LogLine> = raw_lines.into_iter().map(Self::parse).collect();
        lines.sort_by_key(LogLine::sort_key);
        lines
    }
}
