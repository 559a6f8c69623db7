use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};

use logpanel_types::LogLine;

use crate::error::Result;

/// One tracked keyword and its compiled case-insensitive pattern
struct Keyword {
    name: String,
    regex: Regex,
    count: usize,
}

/// Running per-keyword line counts over a buffer
///
/// Patterns are compiled once at construction. Counts only grow, except on
/// [`reset`](Self::reset) or [`recompute`](Self::recompute).
pub struct QuickCounters {
    keywords: Vec<Keyword>,
}

impl QuickCounters {
    /// Build counters for `keywords`. A keyword that is not a valid regular
    /// expression is matched literally instead.
    pub fn new(keywords: &[String]) -> Result<Self> {
        let keywords = keywords
            .iter()
            .map(|name| {
                Ok(Keyword {
                    name: name.clone(),
                    regex: compile_keyword(name)?,
                    count: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { keywords })
    }

    /// Count matches in newly ingested lines
    pub fn observe<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a LogLine>,
    {
        for line in lines {
            for keyword in &mut self.keywords {
                if keyword.regex.is_match(&line.raw) {
                    keyword.count += 1;
                }
            }
        }
    }

    /// Reset every count to 0
    pub fn reset(&mut self) {
        for keyword in &mut self.keywords {
            keyword.count = 0;
        }
    }

    /// Recount from scratch over a whole buffer
    pub fn recompute<'a, I>(&mut self, lines: I)
    where
        I: IntoIterator<Item = &'a LogLine>,
    {
        self.reset();
        self.observe(lines);
    }

    pub fn count(&self, keyword: &str) -> Option<usize> {
        self.keywords
            .iter()
            .find(|k| k.name == keyword)
            .map(|k| k.count)
    }

    /// Snapshot of all counts keyed by keyword
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.keywords
            .iter()
            .map(|k| (k.name.clone(), k.count))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

fn compile_keyword(keyword: &str) -> Result<Regex> {
    let build = |pattern: &str| RegexBuilder::new(pattern).case_insensitive(true).build();

    match build(keyword) {
        Ok(regex) => Ok(regex),
        Err(e) => {
            tracing::warn!(
                keyword,
                error = %e,
                "Keyword is not a valid pattern, matching literally"
            );
            Ok(build(&regex::escape(keyword))?)
        }
    }
}
