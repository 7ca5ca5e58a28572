//! Strongly-typed line and entry indices plus the [`Section`] range type.
//!
//! Indices are signed so that `-1` can act as the "invalid" sentinel handed
//! out by lookups that find nothing. Valid indices are never negative and are
//! never recycled for the lifetime of a source.

use std::fmt;
use std::ops::Add;

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(i64);

        impl $name {
            /// Sentinel for "no such line/entry".
            pub const INVALID: Self = Self(-1);

            pub const fn new(value: i64) -> Self {
                if value < 0 {
                    Self::INVALID
                } else {
                    Self(value)
                }
            }

            pub const fn value(self) -> i64 {
                self.0
            }

            pub const fn is_valid(self) -> bool {
                self.0 >= 0
            }

            /// The index as a storage position, or `None` for the sentinel.
            pub fn as_usize(self) -> Option<usize> {
                usize::try_from(self.0).ok()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self::new(i64::try_from(value).unwrap_or(i64::MAX))
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            fn add(self, rhs: usize) -> Self {
                if !self.is_valid() {
                    return Self::INVALID;
                }
                Self(self.0.saturating_add(i64::try_from(rhs).unwrap_or(i64::MAX)))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "#{}", self.0)
                } else {
                    f.write_str("Invalid")
                }
            }
        }
    };
}

index_type!(
    /// Position of a physical line within a log file.
    LineIndex
);

index_type!(
    /// Position of a logical (possibly multi-line) log entry.
    EntryIndex
);

/// A contiguous range `[index, index + count)` of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Section {
    pub index: LineIndex,
    pub count: usize,
}

impl Section {
    pub fn new(index: impl Into<LineIndex>, count: usize) -> Self {
        Self {
            index: index.into(),
            count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// One past the last line of the section; `None` when the start is invalid.
    pub fn end(&self) -> Option<usize> {
        self.index.as_usize().map(|start| start + self.count)
    }

    pub fn contains(&self, line: LineIndex) -> bool {
        match (self.index.as_usize(), line.as_usize()) {
            (Some(start), Some(line)) => line >= start && line < start + self.count,
            _ => false,
        }
    }

    /// Iterate over every line index covered by this section.
    pub fn iter(&self) -> impl Iterator<Item = LineIndex> {
        let start = self.index.as_usize().unwrap_or(0);
        let count = if self.index.is_valid() { self.count } else { 0 };
        (start..start + count).map(LineIndex::from)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, #{}]", self.index, self.count)
    }
}
