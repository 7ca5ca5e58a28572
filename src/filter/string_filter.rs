use memchr::memmem;

use super::Filter;
use crate::entry::LogEntry;

/// Substring match on the raw content of an entry.
pub struct SubstringFilter {
    pattern: String,
    ignore_case: bool,
    finder: memmem::Finder<'static>,
}

impl SubstringFilter {
    pub fn new(pattern: &str, ignore_case: bool) -> Self {
        let needle = if ignore_case {
            pattern.to_lowercase()
        } else {
            pattern.to_string()
        };
        let finder = memmem::Finder::new(needle.as_bytes()).into_owned();
        Self {
            pattern: pattern.to_string(),
            ignore_case,
            finder,
        }
    }
}

impl Filter for SubstringFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        let line = entry.raw_content();
        if !self.ignore_case {
            return self.finder.find(line.as_bytes()).is_some();
        }
        if line.is_ascii() {
            let lower: Vec<u8> = line.bytes().map(|b| b.to_ascii_lowercase()).collect();
            self.finder.find(&lower).is_some()
        } else {
            self.finder.find(line.to_lowercase().as_bytes()).is_some()
        }
    }

    fn description(&self) -> String {
        if self.ignore_case {
            format!("{:?}", self.pattern)
        } else {
            format!("{:?} (case-sensitive)", self.pattern)
        }
    }
}
