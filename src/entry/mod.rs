//! Log entries: rows of typed column values.

pub mod column;
pub mod level;

use std::ops::{Deref, DerefMut};

use chrono::NaiveDateTime;

use crate::error::{LogFileError, Result};
use crate::index::{EntryIndex, LineIndex};
use column::{columns, ColumnDescriptor, ColumnId, ColumnType, ColumnValue};
use level::LevelFlags;

/// One row of a log file, holding a value for every column in its schema.
///
/// Accessing a column outside the schema by value fails with
/// [`LogFileError::NoSuchColumn`]; the `try_` accessors return `None` and
/// the `_or_default` accessors fall back to the column type's default.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    columns: Vec<ColumnId>,
    values: Vec<ColumnValue>,
}

impl LogEntry {
    /// Create an entry whose columns all hold their default values.
    pub fn new(columns: &[ColumnId]) -> Self {
        let mut unique: Vec<ColumnId> = Vec::with_capacity(columns.len());
        for column in columns {
            if !unique.contains(column) {
                unique.push(*column);
            }
        }
        let values = unique.iter().map(|c| c.default_value()).collect();
        Self {
            columns: unique,
            values,
        }
    }

    /// Create an entry carrying every well-known column.
    pub fn with_all_columns() -> Self {
        Self::new(columns::ALL)
    }

    /// Builder-style write that adds the column to the schema if needed.
    pub fn with<T: ColumnType>(mut self, column: ColumnDescriptor<T>, value: T) -> Self {
        self.insert(column, value);
        self
    }

    /// Write a value, extending the schema with the column if it is missing.
    pub fn insert<T: ColumnType>(&mut self, column: ColumnDescriptor<T>, value: T) {
        match self.position(column.id()) {
            Some(pos) => self.values[pos] = value.into_value(),
            None => {
                self.columns.push(column.id());
                self.values.push(value.into_value());
            }
        }
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn contains(&self, column: ColumnId) -> bool {
        self.columns.contains(&column)
    }

    fn position(&self, column: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub fn get<T: ColumnType>(&self, column: ColumnDescriptor<T>) -> Result<T> {
        self.try_get(column)
            .ok_or(LogFileError::NoSuchColumn(column.id()))
    }

    pub fn try_get<T: ColumnType>(&self, column: ColumnDescriptor<T>) -> Option<T> {
        self.position(column.id())
            .and_then(|pos| T::from_value(&self.values[pos]))
    }

    pub fn get_or_default<T: ColumnType>(&self, column: ColumnDescriptor<T>) -> T {
        self.try_get(column).unwrap_or_default()
    }

    pub fn set<T: ColumnType>(&mut self, column: ColumnDescriptor<T>, value: T) -> Result<()> {
        let pos = self
            .position(column.id())
            .ok_or(LogFileError::NoSuchColumn(column.id()))?;
        self.values[pos] = value.into_value();
        Ok(())
    }

    /// Untyped read, for consumers that iterate over the schema.
    pub fn value(&self, column: ColumnId) -> Result<&ColumnValue> {
        self.position(column)
            .map(|pos| &self.values[pos])
            .ok_or(LogFileError::NoSuchColumn(column))
    }

    /// Untyped write; the value must match the column's kind.
    pub fn set_value(&mut self, column: ColumnId, value: ColumnValue) -> Result<()> {
        let pos = self
            .position(column)
            .ok_or(LogFileError::NoSuchColumn(column))?;
        if value.kind() != column.kind() {
            return Err(LogFileError::TypeMismatch {
                column,
                expected: column.kind(),
            });
        }
        self.values[pos] = value;
        Ok(())
    }

    /// Borrowed raw text, or `""` if the entry has no raw content column.
    pub fn raw_content(&self) -> &str {
        match self.position(ColumnId::RawContent).map(|pos| &self.values[pos]) {
            Some(ColumnValue::Text(text)) => text.as_str(),
            _ => "",
        }
    }

    pub fn level(&self) -> LevelFlags {
        self.get_or_default(columns::LOG_LEVEL)
    }

    pub fn index(&self) -> LineIndex {
        self.get_or_default(columns::INDEX)
    }

    pub fn original_index(&self) -> LineIndex {
        self.get_or_default(columns::ORIGINAL_INDEX)
    }

    pub fn entry_index(&self) -> EntryIndex {
        self.get_or_default(columns::LOG_ENTRY_INDEX)
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.get_or_default(columns::TIMESTAMP)
    }

    /// Restrict this entry to a subset of its columns without copying.
    pub fn view<'c>(&self, columns: &'c [ColumnId]) -> LogEntryView<'c, &LogEntry> {
        LogEntryView::new(self, columns)
    }

    pub fn view_mut<'c>(&mut self, columns: &'c [ColumnId]) -> LogEntryView<'c, &mut LogEntry> {
        LogEntryView::new(self, columns)
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::with_all_columns()
    }
}

/// A projection of a [`LogEntry`] onto a declared subset of columns.
///
/// The view does not own entry storage: reads and writes on permitted
/// columns go straight to the backing entry, anything else fails with
/// [`LogFileError::NoSuchColumn`].
#[derive(Debug)]
pub struct LogEntryView<'c, E> {
    entry: E,
    columns: &'c [ColumnId],
}

impl<'c, E> LogEntryView<'c, E>
where
    E: Deref<Target = LogEntry>,
{
    pub fn new(entry: E, columns: &'c [ColumnId]) -> Self {
        Self { entry, columns }
    }

    pub fn columns(&self) -> &[ColumnId] {
        self.columns
    }

    fn permits(&self, column: ColumnId) -> Result<()> {
        if self.columns.contains(&column) {
            Ok(())
        } else {
            Err(LogFileError::NoSuchColumn(column))
        }
    }

    pub fn get<T: ColumnType>(&self, column: ColumnDescriptor<T>) -> Result<T> {
        self.permits(column.id())?;
        self.entry.get(column)
    }

    pub fn try_get<T: ColumnType>(&self, column: ColumnDescriptor<T>) -> Option<T> {
        self.permits(column.id()).ok()?;
        self.entry.try_get(column)
    }

    pub fn value(&self, column: ColumnId) -> Result<&ColumnValue> {
        self.permits(column)?;
        self.entry.value(column)
    }

    pub fn raw_content(&self) -> Result<&str> {
        self.permits(ColumnId::RawContent)?;
        Ok(self.entry.raw_content())
    }
}

impl<E> LogEntryView<'_, E>
where
    E: DerefMut<Target = LogEntry>,
{
    pub fn set<T: ColumnType>(&mut self, column: ColumnDescriptor<T>, value: T) -> Result<()> {
        self.permits(column.id())?;
        self.entry.set(column, value)
    }

    pub fn set_value(&mut self, column: ColumnId, value: ColumnValue) -> Result<()> {
        self.permits(column)?;
        self.entry.set_value(column, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use column::ColumnKind;

    #[test]
    fn new_entry_holds_defaults() {
        let entry = LogEntry::with_all_columns();
        assert_eq!(entry.raw_content(), "");
        assert_eq!(entry.index(), LineIndex::INVALID);
        assert_eq!(entry.level(), LevelFlags::NONE);
        assert_eq!(entry.timestamp(), None);
    }

    #[test]
    fn duplicate_columns_are_collapsed() {
        let entry = LogEntry::new(&[ColumnId::RawContent, ColumnId::RawContent]);
        assert_eq!(entry.columns(), &[ColumnId::RawContent]);
    }

    #[test]
    fn missing_column_is_an_error_by_value() {
        let entry = LogEntry::new(columns::MINIMUM);
        assert!(matches!(
            entry.get(columns::LOG_LEVEL),
            Err(LogFileError::NoSuchColumn(ColumnId::LogLevel))
        ));
        assert_eq!(entry.try_get(columns::LOG_LEVEL), None);
        assert_eq!(entry.get_or_default(columns::LOG_LEVEL), LevelFlags::NONE);
    }

    #[test]
    fn set_and_get_typed() {
        let mut entry = LogEntry::with_all_columns();
        entry.set(columns::RAW_CONTENT, "hello".to_string()).unwrap();
        entry.set(columns::INDEX, LineIndex::new(3)).unwrap();
        assert_eq!(entry.get(columns::RAW_CONTENT).unwrap(), "hello");
        assert_eq!(entry.index(), LineIndex::new(3));
    }

    #[test]
    fn builder_extends_schema() {
        let entry = LogEntry::new(&[])
            .with(columns::RAW_CONTENT, "x".to_string())
            .with(columns::LOG_LEVEL, LevelFlags::WARNING)
            .with(columns::RAW_CONTENT, "y".to_string());
        assert_eq!(entry.columns(), &[ColumnId::RawContent, ColumnId::LogLevel]);
        assert_eq!(entry.raw_content(), "y");
        assert_eq!(entry.level(), LevelFlags::WARNING);
    }

    #[test]
    fn set_on_missing_column_fails() {
        let mut entry = LogEntry::new(columns::MINIMUM);
        assert!(entry.set(columns::LOG_LEVEL, LevelFlags::INFO).is_err());
    }

    #[test]
    fn untyped_write_checks_kind() {
        let mut entry = LogEntry::with_all_columns();
        let err = entry
            .set_value(ColumnId::LineNumber, ColumnValue::Text("x".into()))
            .unwrap_err();
        assert!(matches!(
            err,
            LogFileError::TypeMismatch {
                column: ColumnId::LineNumber,
                expected: ColumnKind::Number
            }
        ));
        entry
            .set_value(ColumnId::LineNumber, ColumnValue::Number(7))
            .unwrap();
        assert_eq!(entry.get(columns::LINE_NUMBER).unwrap(), 7);
    }

    #[test]
    fn view_forwards_permitted_columns() {
        let mut entry = LogEntry::with_all_columns();
        entry.set(columns::RAW_CONTENT, "abc".to_string()).unwrap();

        let view = entry.view(&[ColumnId::RawContent]);
        assert_eq!(view.get(columns::RAW_CONTENT).unwrap(), "abc");
        assert_eq!(view.raw_content().unwrap(), "abc");
        assert_eq!(view.columns(), &[ColumnId::RawContent]);
    }

    #[test]
    fn view_rejects_columns_outside_subset() {
        let entry = LogEntry::with_all_columns();
        let view = entry.view(&[ColumnId::RawContent]);
        assert!(matches!(
            view.get(columns::INDEX),
            Err(LogFileError::NoSuchColumn(ColumnId::Index))
        ));
        assert_eq!(view.try_get(columns::INDEX), None);
        assert!(view.value(ColumnId::LogLevel).is_err());
    }

    #[test]
    fn view_writes_reach_backing_entry() {
        let mut entry = LogEntry::with_all_columns();
        {
            let mut view = entry.view_mut(&[ColumnId::LogLevel]);
            view.set(columns::LOG_LEVEL, LevelFlags::ERROR).unwrap();
            assert!(view.set(columns::RAW_CONTENT, "nope".into()).is_err());
        }
        assert_eq!(entry.level(), LevelFlags::ERROR);
        assert_eq!(entry.raw_content(), "");
    }

    #[test]
    fn view_over_column_missing_in_entry_fails() {
        let entry = LogEntry::new(columns::MINIMUM);
        let view = entry.view(&[ColumnId::Timestamp]);
        assert!(view.get(columns::TIMESTAMP).is_err());
    }
}
