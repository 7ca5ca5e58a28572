//! Log file formats supplied from outside the core.
//!
//! A [`FormatMatcher`] looks at a file's name and first lines and may
//! recognize its format ahead of time. A recognized timestamp layout is used
//! as-is instead of auto-detecting one.

use std::path::Path;
use std::sync::Arc;

use crate::reader::timestamp::TimestampLayout;

/// How many leading lines are handed to matchers.
pub const INITIAL_LINES: usize = 16;

/// A recognized log file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileFormat {
    pub name: String,
    pub timestamp: Option<TimestampLayout>,
}

impl LogFileFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, layout: TimestampLayout) -> Self {
        self.timestamp = Some(layout);
        self
    }
}

pub trait FormatMatcher: Send + Sync {
    fn try_match_format(&self, path: &Path, initial_lines: &[String]) -> Option<LogFileFormat>;
}

impl<F> FormatMatcher for F
where
    F: Fn(&Path, &[String]) -> Option<LogFileFormat> + Send + Sync,
{
    fn try_match_format(&self, path: &Path, initial_lines: &[String]) -> Option<LogFileFormat> {
        self(path, initial_lines)
    }
}

/// Tries several matchers in order; the first match wins.
#[derive(Default, Clone)]
pub struct CompositeFormatMatcher {
    matchers: Vec<Arc<dyn FormatMatcher>>,
}

impl CompositeFormatMatcher {
    pub fn new(matchers: Vec<Arc<dyn FormatMatcher>>) -> Self {
        Self { matchers }
    }

    pub fn push(&mut self, matcher: Arc<dyn FormatMatcher>) {
        self.matchers.push(matcher);
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl FormatMatcher for CompositeFormatMatcher {
    fn try_match_format(&self, path: &Path, initial_lines: &[String]) -> Option<LogFileFormat> {
        self.matchers
            .iter()
            .find_map(|m| m.try_match_format(path, initial_lines))
    }
}
