use regex::{Regex, RegexBuilder};

use super::Filter;
use crate::entry::LogEntry;
use crate::error::FilterError;

/// Regex-based filter
pub struct RegexFilter {
    regex: Regex,
}

impl RegexFilter {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self, FilterError> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(ignore_case)
            .build()
            .map_err(|source| FilterError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { regex })
    }

    pub(crate) fn from_regex(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Filter for RegexFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.regex.is_match(entry.raw_content())
    }

    fn description(&self) -> String {
        format!("/{}/", self.regex.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::column::columns;

    fn line(text: &str) -> LogEntry {
        LogEntry::new(&[]).with(columns::RAW_CONTENT, text.to_string())
    }

    #[test]
    fn matches_pattern() {
        let filter = RegexFilter::new(r"id=\d+", false).unwrap();
        assert!(filter.matches(&line("user id=42 logged in")));
        assert!(!filter.matches(&line("user id=abc")));
    }

    #[test]
    fn ignore_case() {
        let filter = RegexFilter::new("^warn", true).unwrap();
        assert!(filter.matches(&line("WARN disk")));
        assert!(!RegexFilter::new("^warn", false)
            .unwrap()
            .matches(&line("WARN disk")));
    }

    #[test]
    fn malformed_pattern_is_reported() {
        let err = RegexFilter::new("(unclosed", false).err().unwrap();
        match err {
            FilterError::InvalidRegex { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
