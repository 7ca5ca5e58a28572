//! Error taxonomy shared by readers, filtered views and data sources.

use crate::entry::column::{ColumnId, ColumnKind};

/// Failure of an operation on a log file, an entry or a data source.
///
/// Transient I/O problems never show up here: the tailing loop swallows them
/// and keeps polling. What does show up is either a contract violation by
/// the caller or a fault that killed a background reader.
#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    #[error("section starts at a negative index")]
    NegativeSection,

    #[error("destination holds {available} entries but {requested} were requested")]
    DestinationTooSmall { requested: usize, available: usize },

    #[error("section [{index}, +{count}) exceeds the {len} available entries")]
    SectionOutOfRange {
        index: usize,
        count: usize,
        len: usize,
    },

    #[error("index {index} is out of range (count is {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("no such column: {0}")]
    NoSuchColumn(ColumnId),

    #[error("column {column} holds {expected} values")]
    TypeMismatch {
        column: ColumnId,
        expected: ColumnKind,
    },

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("background reader failed: {0}")]
    Faulted(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to build a filter from its textual description.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("invalid regex `{pattern}`: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("filter pattern must not be empty")]
    EmptyPattern,
}

pub type Result<T, E = LogFileError> = std::result::Result<T, E>;
