//! Timestamp layout detection.
//!
//! A layout is the byte column and length of the timestamp within a line.
//! Detection looks for the longest substring that parses as a timestamp.
//! Candidates are bounded: they must start with an ASCII digit within the
//! first [`SCAN_PREFIX`] bytes and be at most [`MAX_CANDIDATE_LEN`] bytes long.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

/// How far into a line a timestamp may start.
pub const SCAN_PREFIX: usize = 64;
/// Longest substring considered a timestamp candidate.
pub const MAX_CANDIDATE_LEN: usize = 40;
/// Shortest candidate worth parsing (`HH:MM:SS`).
const MIN_CANDIDATE_LEN: usize = 8;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S,%3f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d/%b/%Y:%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S,%3f"];

/// Where the timestamp sits within each line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimestampLayout {
    /// Byte offset of the first timestamp character.
    pub column: usize,
    /// Length of the timestamp in bytes.
    pub length: usize,
    /// Explicit chrono format; `None` tries the built-in formats.
    #[serde(default)]
    pub format: Option<String>,
}

impl TimestampLayout {
    pub fn new(column: usize, length: usize) -> Self {
        Self {
            column,
            length,
            format: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Parse the timestamp of `line`, if it has one at this layout's position.
    pub fn parse(&self, line: &str) -> Option<NaiveDateTime> {
        let end = self.column.checked_add(self.length)?;
        let text = line.get(self.column..end)?;
        match &self.format {
            Some(format) => NaiveDateTime::parse_from_str(text, format).ok(),
            None => parse_timestamp(text),
        }
    }

    /// Human readable description used for the `Format` property.
    pub fn describe(&self) -> String {
        match &self.format {
            Some(format) => format!("{} @{}+{}", format, self.column, self.length),
            None => format!("timestamp @{}+{}", self.column, self.length),
        }
    }
}

/// Parse `text` as a whole using the built-in formats.
///
/// Date-only values get midnight, time-only values get 1970-01-01.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_local());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return NaiveDate::from_ymd_opt(1970, 1, 1).map(|date| date.and_time(time));
        }
    }
    None
}

/// Find the longest parseable timestamp in `line`.
///
/// Ties go to the earliest start. Returns `None` if nothing parses.
pub fn detect_layout(line: &str) -> Option<TimestampLayout> {
    let bytes = line.as_bytes();
    let scan_end = bytes.len().min(SCAN_PREFIX);
    let mut best: Option<TimestampLayout> = None;

    for start in 0..scan_end {
        if !bytes[start].is_ascii_digit() || !line.is_char_boundary(start) {
            continue;
        }
        let longest_end = bytes.len().min(start + MAX_CANDIDATE_LEN);
        let best_len = best.as_ref().map_or(0, |b| b.length);

        // Longest first: the first hit for this start is its best.
        for end in (start + MIN_CANDIDATE_LEN..=longest_end).rev() {
            let length = end - start;
            if length <= best_len {
                break;
            }
            let Some(candidate) = line.get(start..end) else {
                continue;
            };
            if parse_timestamp(candidate).is_some() {
                best = Some(TimestampLayout::new(start, length));
                break;
            }
        }
    }

    best
}
