use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::entry::column::columns;
use crate::entry::level::{detect_level, LevelFlags};
use crate::entry::LogEntry;
use crate::error::Result;
use crate::index::{LineIndex, Section};
use crate::listener::{ListenerId, ListenerRegistry, LogFileListener, Modification};
use crate::properties::{Percentage, Property, PropertyBag, PropertyValue};
use crate::reader::{checked_index, checked_range, LogFile};

/// In-memory log file for testing; appends notify listeners synchronously.
#[derive(Default)]
pub struct MemoryLogFile {
    entries: Mutex<Vec<LogEntry>>,
    listeners: ListenerRegistry,
}

impl MemoryLogFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append lines, detecting their levels from the text.
    pub fn push_lines(&self, lines: &[&str]) {
        let entries: Vec<(&str, LevelFlags)> =
            lines.iter().map(|line| (*line, detect_level(line))).collect();
        self.push_all(&entries);
    }

    /// Append lines with explicit levels.
    pub fn push_all(&self, lines: &[(&str, LevelFlags)]) {
        {
            let mut entries = self.entries.lock();
            for (text, level) in lines {
                let index = LineIndex::from(entries.len());
                let line_number = entries.len() as i64 + 1;
                entries.push(
                    LogEntry::with_all_columns()
                        .with(columns::RAW_CONTENT, text.to_string())
                        .with(columns::INDEX, index)
                        .with(columns::ORIGINAL_INDEX, index)
                        .with(columns::LINE_NUMBER, line_number)
                        .with(columns::ORIGINAL_LINE_NUMBER, line_number)
                        .with(columns::LOG_LEVEL, *level),
                );
            }
        }
        self.listeners.notify_appended(lines.len());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl LogFile for MemoryLogFile {
    fn count(&self) -> usize {
        self.entries.lock().len()
    }

    fn get_section(&self, section: Section, dest: &mut [LogEntry]) -> Result<()> {
        let entries = self.entries.lock();
        let range = checked_range(section, dest.len(), entries.len())?;
        dest[..section.count].clone_from_slice(&entries[range]);
        Ok(())
    }

    fn get_entry(&self, index: LineIndex) -> Result<LogEntry> {
        let entries = self.entries.lock();
        let i = checked_index(index, entries.len())?;
        Ok(entries[i].clone())
    }

    fn properties(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.set(Property::LogEntryCount, PropertyValue::Count(self.count()));
        bag.set(
            Property::PercentageProcessed,
            PropertyValue::Percentage(Percentage::HUNDRED),
        );
        bag
    }

    fn add_listener(
        &self,
        listener: Arc<dyn LogFileListener>,
        max_wait: Duration,
        max_batch: usize,
    ) -> ListenerId {
        self.listeners.add_listener(listener, max_wait, max_batch)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove_listener(id)
    }
}

/// Listener that records every modification it receives.
#[derive(Default)]
pub struct RecordingListener {
    received: Mutex<Vec<Modification>>,
}

impl RecordingListener {
    pub fn modifications(&self) -> Vec<Modification> {
        self.received.lock().clone()
    }

    /// Lines reported since the last reset.
    pub fn appended_total(&self) -> usize {
        self.received
            .lock()
            .iter()
            .fold(0, |total, modification| match modification {
                Modification::Appended(section) => total + section.count,
                Modification::Reset => 0,
            })
    }
}

impl LogFileListener for RecordingListener {
    fn on_modified(&self, modification: Modification) {
        self.received.lock().push(modification);
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
