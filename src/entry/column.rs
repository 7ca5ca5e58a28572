//! Column schema for log entries.
//!
//! The set of columns is closed: every column has a [`ColumnId`] carrying its
//! name, its value kind and its default. Typed access goes through a
//! [`ColumnDescriptor<T>`], whose type parameter is tied to the column's kind
//! by the constants in [`columns`].

use std::fmt;
use std::marker::PhantomData;

use chrono::{Duration, NaiveDateTime};

use crate::entry::level::LevelFlags;
use crate::index::{EntryIndex, LineIndex};

/// Identifies which source a line came from when several are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceId(pub u8);

/// Identity of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnId {
    RawContent,
    Index,
    OriginalIndex,
    LogEntryIndex,
    LineNumber,
    OriginalLineNumber,
    Timestamp,
    ElapsedTime,
    DeltaTime,
    LogLevel,
    SourceId,
    OriginalDataSourceName,
}

/// Static type tag of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    LineIndex,
    EntryIndex,
    Number,
    Timestamp,
    Duration,
    Level,
    SourceId,
}

impl ColumnId {
    pub const fn name(self) -> &'static str {
        match self {
            ColumnId::RawContent => "raw_content",
            ColumnId::Index => "index",
            ColumnId::OriginalIndex => "original_index",
            ColumnId::LogEntryIndex => "log_entry_index",
            ColumnId::LineNumber => "line_number",
            ColumnId::OriginalLineNumber => "original_line_number",
            ColumnId::Timestamp => "timestamp",
            ColumnId::ElapsedTime => "elapsed_time",
            ColumnId::DeltaTime => "delta_time",
            ColumnId::LogLevel => "log_level",
            ColumnId::SourceId => "source_id",
            ColumnId::OriginalDataSourceName => "original_data_source_name",
        }
    }

    pub const fn kind(self) -> ColumnKind {
        match self {
            ColumnId::RawContent | ColumnId::OriginalDataSourceName => ColumnKind::Text,
            ColumnId::Index | ColumnId::OriginalIndex => ColumnKind::LineIndex,
            ColumnId::LogEntryIndex => ColumnKind::EntryIndex,
            ColumnId::LineNumber | ColumnId::OriginalLineNumber => ColumnKind::Number,
            ColumnId::Timestamp => ColumnKind::Timestamp,
            ColumnId::ElapsedTime | ColumnId::DeltaTime => ColumnKind::Duration,
            ColumnId::LogLevel => ColumnKind::Level,
            ColumnId::SourceId => ColumnKind::SourceId,
        }
    }

    /// The value a column holds before anything was written to it.
    pub fn default_value(self) -> ColumnValue {
        match self.kind() {
            ColumnKind::Text => ColumnValue::Text(String::new()),
            ColumnKind::LineIndex => ColumnValue::LineIndex(LineIndex::INVALID),
            ColumnKind::EntryIndex => ColumnValue::EntryIndex(EntryIndex::INVALID),
            ColumnKind::Number => ColumnValue::Number(0),
            ColumnKind::Timestamp => ColumnValue::Timestamp(None),
            ColumnKind::Duration => ColumnValue::Duration(None),
            ColumnKind::Level => ColumnValue::Level(LevelFlags::NONE),
            ColumnKind::SourceId => ColumnValue::SourceId(SourceId::default()),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Text => "text",
            ColumnKind::LineIndex => "line index",
            ColumnKind::EntryIndex => "entry index",
            ColumnKind::Number => "number",
            ColumnKind::Timestamp => "timestamp",
            ColumnKind::Duration => "duration",
            ColumnKind::Level => "level",
            ColumnKind::SourceId => "source id",
        };
        f.write_str(name)
    }
}

/// A dynamically typed column value.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    LineIndex(LineIndex),
    EntryIndex(EntryIndex),
    Number(i64),
    Timestamp(Option<NaiveDateTime>),
    Duration(Option<Duration>),
    Level(LevelFlags),
    SourceId(SourceId),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValue::Text(_) => ColumnKind::Text,
            ColumnValue::LineIndex(_) => ColumnKind::LineIndex,
            ColumnValue::EntryIndex(_) => ColumnKind::EntryIndex,
            ColumnValue::Number(_) => ColumnKind::Number,
            ColumnValue::Timestamp(_) => ColumnKind::Timestamp,
            ColumnValue::Duration(_) => ColumnKind::Duration,
            ColumnValue::Level(_) => ColumnKind::Level,
            ColumnValue::SourceId(_) => ColumnKind::SourceId,
        }
    }
}

/// Rust types that can be stored in a column.
pub trait ColumnType: Clone + Default + Send + Sync + 'static {
    const KIND: ColumnKind;
    fn into_value(self) -> ColumnValue;
    fn from_value(value: &ColumnValue) -> Option<Self>;
}

macro_rules! column_type {
    ($ty:ty, $kind:ident) => {
        impl ColumnType for $ty {
            const KIND: ColumnKind = ColumnKind::$kind;

            fn into_value(self) -> ColumnValue {
                ColumnValue::$kind(self)
            }

            fn from_value(value: &ColumnValue) -> Option<Self> {
                match value {
                    ColumnValue::$kind(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

column_type!(String, Text);
column_type!(LineIndex, LineIndex);
column_type!(EntryIndex, EntryIndex);
column_type!(i64, Number);
column_type!(Option<NaiveDateTime>, Timestamp);
column_type!(Option<Duration>, Duration);
column_type!(LevelFlags, Level);
column_type!(SourceId, SourceId);

/// Typed handle on a column.
pub struct ColumnDescriptor<T> {
    id: ColumnId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: ColumnType> ColumnDescriptor<T> {
    const fn new(id: ColumnId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub const fn id(&self) -> ColumnId {
        self.id
    }

    pub fn default_value(&self) -> T {
        T::default()
    }
}

impl<T> Clone for ColumnDescriptor<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColumnDescriptor<T> {}

impl<T> fmt::Debug for ColumnDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ColumnDescriptor").field(&self.id).finish()
    }
}

/// The well-known columns.
pub mod columns {
    use super::*;

    pub const RAW_CONTENT: ColumnDescriptor<String> = ColumnDescriptor::new(ColumnId::RawContent);
    pub const INDEX: ColumnDescriptor<LineIndex> = ColumnDescriptor::new(ColumnId::Index);
    pub const ORIGINAL_INDEX: ColumnDescriptor<LineIndex> =
        ColumnDescriptor::new(ColumnId::OriginalIndex);
    pub const LOG_ENTRY_INDEX: ColumnDescriptor<EntryIndex> =
        ColumnDescriptor::new(ColumnId::LogEntryIndex);
    pub const LINE_NUMBER: ColumnDescriptor<i64> = ColumnDescriptor::new(ColumnId::LineNumber);
    pub const ORIGINAL_LINE_NUMBER: ColumnDescriptor<i64> =
        ColumnDescriptor::new(ColumnId::OriginalLineNumber);
    pub const TIMESTAMP: ColumnDescriptor<Option<NaiveDateTime>> =
        ColumnDescriptor::new(ColumnId::Timestamp);
    pub const ELAPSED_TIME: ColumnDescriptor<Option<Duration>> =
        ColumnDescriptor::new(ColumnId::ElapsedTime);
    pub const DELTA_TIME: ColumnDescriptor<Option<Duration>> =
        ColumnDescriptor::new(ColumnId::DeltaTime);
    pub const LOG_LEVEL: ColumnDescriptor<LevelFlags> = ColumnDescriptor::new(ColumnId::LogLevel);
    pub const SOURCE_ID: ColumnDescriptor<SourceId> = ColumnDescriptor::new(ColumnId::SourceId);
    pub const ORIGINAL_DATA_SOURCE_NAME: ColumnDescriptor<String> =
        ColumnDescriptor::new(ColumnId::OriginalDataSourceName);

    /// Every column a source reader fills in.
    pub const ALL: &[ColumnId] = &[
        ColumnId::RawContent,
        ColumnId::Index,
        ColumnId::OriginalIndex,
        ColumnId::LogEntryIndex,
        ColumnId::LineNumber,
        ColumnId::OriginalLineNumber,
        ColumnId::Timestamp,
        ColumnId::ElapsedTime,
        ColumnId::DeltaTime,
        ColumnId::LogLevel,
        ColumnId::SourceId,
        ColumnId::OriginalDataSourceName,
    ];

    /// The columns a plain line carries before any parsing.
    pub const MINIMUM: &[ColumnId] = &[
        ColumnId::RawContent,
        ColumnId::Index,
        ColumnId::LineNumber,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_kinds_match_column_kinds() {
        assert_eq!(columns::RAW_CONTENT.id().kind(), String::KIND);
        assert_eq!(columns::INDEX.id().kind(), LineIndex::KIND);
        assert_eq!(columns::LOG_ENTRY_INDEX.id().kind(), EntryIndex::KIND);
        assert_eq!(columns::LINE_NUMBER.id().kind(), i64::KIND);
        assert_eq!(columns::TIMESTAMP.id().kind(), <Option<NaiveDateTime> as ColumnType>::KIND);
        assert_eq!(columns::DELTA_TIME.id().kind(), <Option<Duration> as ColumnType>::KIND);
        assert_eq!(columns::LOG_LEVEL.id().kind(), LevelFlags::KIND);
        assert_eq!(columns::SOURCE_ID.id().kind(), SourceId::KIND);
    }

    #[test]
    fn default_values_have_the_column_kind() {
        for column in columns::ALL {
            assert_eq!(column.default_value().kind(), column.kind(), "{column}");
        }
    }

    #[test]
    fn index_defaults_are_invalid() {
        assert_eq!(columns::INDEX.default_value(), LineIndex::INVALID);
        assert_eq!(
            ColumnId::OriginalIndex.default_value(),
            ColumnValue::LineIndex(LineIndex::INVALID)
        );
    }

    #[test]
    fn value_round_trip_rejects_other_kinds() {
        let value = "hello".to_string().into_value();
        assert_eq!(String::from_value(&value), Some("hello".to_string()));
        assert_eq!(i64::from_value(&value), None);
    }
}
