//! Tails growing log files and exposes them as typed entries with live
//! filtered views.

pub mod cancel;
pub mod config;
pub mod data_source;
pub mod data_sources;
pub mod entry;
pub mod error;
pub mod filter;
pub mod index;
pub mod listener;
pub mod properties;
pub mod reader;

#[cfg(test)]
mod test_utils;

pub use data_source::{DataSource, DataSourceState};
pub use data_sources::{DataSourceId, DataSources};
pub use entry::level::LevelFlags;
pub use entry::LogEntry;
pub use error::{FilterError, LogFileError};
pub use index::{EntryIndex, LineIndex, Section};
pub use reader::LogFile;
