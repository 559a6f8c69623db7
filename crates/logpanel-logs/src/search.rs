use regex::{Regex, RegexBuilder};

use logpanel_types::{ArcLogLine, SearchMatch};

use crate::error::Result;

/// Default cap on matches returned by one search
pub const DEFAULT_MAX_MATCHES: usize = 100;

/// Compiled search query
#[derive(Clone)]
pub struct CompiledSearch {
    regex: Regex,

    /// Original query string
    query: String,

    /// Whether `query` was compiled as a regular expression
    is_regex: bool,

    case_sensitive: bool,
}

impl CompiledSearch {
    /// Compile a query. Literal queries have every metacharacter escaped.
    pub fn new(query: &str, is_regex: bool, case_sensitive: bool) -> Result<Self> {
        let pattern = if is_regex {
            query.to_string()
        } else {
            regex::escape(query)
        };

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(!case_sensitive)
            .build()?;

        Ok(Self {
            regex,
            query: query.to_string(),
            is_regex,
            case_sensitive,
        })
    }

    /// Run against a frozen snapshot, keeping the most recent `max_matches` hits.
    ///
    /// The scan walks backwards from the newest line; results are returned in
    /// ascending index order.
    pub fn search(&self, snapshot: &[ArcLogLine], max_matches: usize) -> Vec<SearchMatch> {
        let mut matches: Vec<SearchMatch> = snapshot
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, line)| self.regex.is_match(&line.raw))
            .take(max_matches)
            .map(|(i, line)| SearchMatch::new(i, line))
            .collect();
        matches.reverse();
        matches
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

impl std::fmt::Debug for CompiledSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSearch")
            .field("query", &self.query)
            .field("is_regex", &self.is_regex)
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}
