//! Shell-style wildcard matching: `*` matches any run of characters and `?`
//! matches exactly one. The pattern may match anywhere in the line.

use regex::RegexBuilder;

use super::regex_filter::RegexFilter;
use super::Filter;
use crate::entry::LogEntry;
use crate::error::FilterError;

pub struct WildcardFilter {
    pattern: String,
    inner: RegexFilter,
}

impl WildcardFilter {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self, FilterError> {
        let translated = translate(pattern);
        let regex = RegexBuilder::new(&translated)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| FilterError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self {
            pattern: pattern.to_string(),
            inner: RegexFilter::from_regex(regex),
        })
    }
}

fn translate(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '*' | '?' => {
                out.push_str(&regex::escape(&literal));
                literal.clear();
                out.push_str(if c == '*' { ".*" } else { "." });
            }
            _ => literal.push(c),
        }
    }
    out.push_str(&regex::escape(&literal));
    out
}

impl Filter for WildcardFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.inner.matches(entry)
    }

    fn description(&self) -> String {
        format!("like {:?}", self.pattern)
    }
}
