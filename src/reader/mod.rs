pub mod format;
pub mod source_reader;
pub mod timestamp;

use std::sync::Arc;
use std::time::Duration;

use crate::entry::LogEntry;
use crate::error::{LogFileError, Result};
use crate::index::{LineIndex, Section};
use crate::listener::{ListenerId, LogFileListener};
use crate::properties::PropertyBag;

pub use source_reader::{SourceReader, SourceReaderOptions};

/// Query surface shared by source readers and filtered views.
///
/// Everything here is safe to call from any thread while the file is being
/// appended to. A consumer that reads `[0, n)` after being told about `n`
/// lines sees exactly those lines, in file order.
pub trait LogFile: Send + Sync {
    /// Number of entries currently available.
    fn count(&self) -> usize;

    /// Copy `section.count` entries starting at `section.index` into `dest`.
    fn get_section(&self, section: Section, dest: &mut [LogEntry]) -> Result<()>;

    fn get_entry(&self, index: LineIndex) -> Result<LogEntry>;

    /// Snapshot of the file's metadata and progress.
    fn properties(&self) -> PropertyBag;

    fn add_listener(
        &self,
        listener: Arc<dyn LogFileListener>,
        max_wait: Duration,
        max_batch: usize,
    ) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Like [`LogFile::get_section`] but allocates the destination.
    fn get_entries(&self, section: Section) -> Result<Vec<LogEntry>> {
        let mut entries = vec![LogEntry::default(); section.count];
        self.get_section(section, &mut entries)?;
        Ok(entries)
    }
}

/// Check a section request against the destination and the stored entries,
/// returning the `start..end` range to copy.
pub(crate) fn checked_range(
    section: Section,
    dest_len: usize,
    len: usize,
) -> Result<std::ops::Range<usize>> {
    let start = section.index.as_usize().ok_or(LogFileError::NegativeSection)?;
    if dest_len < section.count {
        return Err(LogFileError::DestinationTooSmall {
            requested: section.count,
            available: dest_len,
        });
    }
    let end = start
        .checked_add(section.count)
        .filter(|end| *end <= len)
        .ok_or(LogFileError::SectionOutOfRange {
            index: start,
            count: section.count,
            len,
        })?;
    Ok(start..end)
}

/// Check a single index against the stored entries.
pub(crate) fn checked_index(index: LineIndex, len: usize) -> Result<usize> {
    index
        .as_usize()
        .filter(|i| *i < len)
        .ok_or(LogFileError::IndexOutOfRange {
            index: index.value(),
            len,
        })
}
