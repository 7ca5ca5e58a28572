pub mod level_filter;
pub mod quick_filter;
pub mod regex_filter;
pub mod string_filter;
pub mod view;
pub mod wildcard_filter;

use crate::entry::LogEntry;

pub use level_filter::LevelFilter;
pub use quick_filter::{MatchType, QuickFilterSettings};
pub use regex_filter::RegexFilter;
pub use string_filter::SubstringFilter;
pub use view::FilteredView;
pub use wildcard_filter::WildcardFilter;

/// Trait for extensible filtering
pub trait Filter: Send + Sync {
    fn matches(&self, entry: &LogEntry) -> bool;

    fn description(&self) -> String;
}

/// Accepts what the inner filter rejects.
pub struct InvertFilter {
    inner: Box<dyn Filter>,
}

impl InvertFilter {
    pub fn new(inner: Box<dyn Filter>) -> Self {
        Self { inner }
    }
}

impl Filter for InvertFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        !self.inner.matches(entry)
    }

    fn description(&self) -> String {
        format!("not ({})", self.inner.description())
    }
}

/// Ordered conjunction of filters. An empty chain accepts everything.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl Filter for FilterChain {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.filters.iter().all(|f| f.matches(entry))
    }

    fn description(&self) -> String {
        if self.filters.is_empty() {
            return "everything".to_string();
        }
        self.filters
            .iter()
            .map(|f| f.description())
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

impl FromIterator<Box<dyn Filter>> for FilterChain {
    fn from_iter<I: IntoIterator<Item = Box<dyn Filter>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
