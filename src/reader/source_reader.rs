//! Tailing reader for a single log file on disk.
//!
//! A background thread owns the file handle. It reads complete lines in
//! batches, parses them into entries outside of any lock, appends them to the
//! shared store and then notifies listeners. Readers of the store only ever
//! take the store lock for the duration of a copy.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, debug_span, error, trace, warn};

use super::format::{FormatMatcher, LogFileFormat, INITIAL_LINES};
use super::timestamp::{detect_layout, TimestampLayout};
use super::{checked_index, checked_range, LogFile};
use crate::cancel::CancelToken;
use crate::entry::column::{columns, SourceId};
use crate::entry::level::{detect_level, LevelCounts, LevelFlags};
use crate::entry::LogEntry;
use crate::error::{LogFileError, Result};
use crate::index::{EntryIndex, LineIndex, Section};
use crate::listener::{ListenerId, ListenerRegistry, LogFileListener};
use crate::properties::{Percentage, Property, PropertyBag, PropertyValue};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lines parsed before they are published to the store.
const BATCH_LINES: usize = 1000;
/// Lines inspected for a timestamp before giving up on detection.
const DETECTION_LINES: usize = 100;
/// Granularity at which `wait` re-checks for disposal.
const WAIT_POLL: Duration = Duration::from_millis(100);
const ENCODING: &str = "utf-8 (lossy)";

/// Knobs for a [`SourceReader`].
#[derive(Clone)]
pub struct SourceReaderOptions {
    /// How long to sleep at end of file before checking for growth.
    pub poll_interval: Duration,
    /// Externally known timestamp layout; disables auto-detection.
    pub timestamp_layout: Option<TimestampLayout>,
    /// Consulted once with the first lines of the file.
    pub format_matcher: Option<Arc<dyn FormatMatcher>>,
    pub source_id: SourceId,
    /// Display name; defaults to the file name.
    pub name: Option<String>,
}

impl Default for SourceReaderOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timestamp_layout: None,
            format_matcher: None,
            source_id: SourceId::default(),
            name: None,
        }
    }
}

#[derive(Default)]
struct Store {
    entries: Vec<LogEntry>,
    counts: LevelCounts,
    format: Option<String>,
    first_timestamp: Option<NaiveDateTime>,
    last_timestamp: Option<NaiveDateTime>,
    size: Option<u64>,
    /// Bytes turned into entries.
    consumed: u64,
    percentage: Percentage,
    last_modified: Option<DateTime<Utc>>,
    created: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Status {
    /// Set when the reader caught up with the file, cleared by new data.
    end_of_section: bool,
    fault: Option<String>,
}

enum Worker {
    Idle,
    Running(JoinHandle<()>),
    Disposed,
}

struct Shared {
    path: PathBuf,
    name: String,
    options: SourceReaderOptions,
    store: Mutex<Store>,
    status: Mutex<Status>,
    status_changed: Condvar,
    listeners: ListenerRegistry,
}

impl Shared {
    fn update_status(&self, update: impl FnOnce(&mut Status)) {
        let mut status = self.status.lock();
        update(&mut status);
        self.status_changed.notify_all();
    }
}

/// Incrementally indexes a growing text file.
///
/// Lines become visible in file order and are never removed; the entry at a
/// given index does not change once published. Reading is started with
/// [`SourceReader::start`] and stopped by [`SourceReader::dispose`] or drop.
pub struct SourceReader {
    shared: Arc<Shared>,
    cancel: CancelToken,
    worker: Mutex<Worker>,
}

impl SourceReader {
    pub fn new(path: impl AsRef<Path>, options: SourceReaderOptions) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = options.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        Self {
            shared: Arc::new(Shared {
                path,
                name,
                options,
                store: Mutex::new(Store::default()),
                status: Mutex::new(Status::default()),
                status_changed: Condvar::new(),
                listeners: ListenerRegistry::new(),
            }),
            cancel: CancelToken::new(),
            worker: Mutex::new(Worker::Idle),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Spawn the tailing thread. Starting twice is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        match *worker {
            Worker::Running(_) => Ok(()),
            Worker::Disposed => Err(LogFileError::InvalidState("reader has been disposed")),
            Worker::Idle => {
                let shared = Arc::clone(&self.shared);
                let cancel = self.cancel.clone();
                let handle = thread::Builder::new()
                    .name(format!("tail {}", self.shared.name))
                    .spawn(move || run(shared, cancel))?;
                *worker = Worker::Running(handle);
                Ok(())
            }
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(*self.worker.lock(), Worker::Running(_))
    }

    /// Block until the current read pass reaches the end of the file.
    ///
    /// Fails with [`LogFileError::Faulted`] if the reader died, and with
    /// [`LogFileError::InvalidState`] if it was never started or gets
    /// disposed while waiting.
    pub fn wait(&self) -> Result<()> {
        match *self.worker.lock() {
            Worker::Idle => return Err(LogFileError::InvalidState("reader has not been started")),
            Worker::Disposed => return Err(LogFileError::InvalidState("reader has been disposed")),
            Worker::Running(_) => {}
        }

        let mut status = self.shared.status.lock();
        loop {
            if let Some(fault) = &status.fault {
                return Err(LogFileError::Faulted(fault.clone()));
            }
            if status.end_of_section {
                return Ok(());
            }
            if self.cancel.is_cancelled() {
                return Err(LogFileError::InvalidState("reader has been disposed"));
            }
            self.shared.status_changed.wait_for(&mut status, WAIT_POLL);
        }
    }

    /// Stop the tailing thread and drop every listener. Idempotent.
    pub fn dispose(&self) {
        self.cancel.cancel();
        let previous = std::mem::replace(&mut *self.worker.lock(), Worker::Disposed);
        if let Worker::Running(handle) = previous {
            // A listener may dispose the reader from the reader's own thread.
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!(path = %self.shared.path.display(), "reader thread panicked during shutdown");
            }
            debug!(path = %self.shared.path.display(), "reader disposed");
        }
        self.shared.listeners.clear();
        self.shared.status_changed.notify_all();
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.worker.lock(), Worker::Disposed)
    }

    /// Message of the error that stopped the reader, if any.
    pub fn fault(&self) -> Option<String> {
        self.shared.status.lock().fault.clone()
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.shared.store.lock().counts
    }

    /// Bytes of the file that have been turned into entries.
    pub fn bytes_consumed(&self) -> u64 {
        self.shared.store.lock().consumed
    }
}

impl Drop for SourceReader {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl LogFile for SourceReader {
    fn count(&self) -> usize {
        self.shared.store.lock().entries.len()
    }

    fn get_section(&self, section: Section, dest: &mut [LogEntry]) -> Result<()> {
        let store = self.shared.store.lock();
        let range = checked_range(section, dest.len(), store.entries.len())?;
        dest[..section.count].clone_from_slice(&store.entries[range]);
        Ok(())
    }

    fn get_entry(&self, index: LineIndex) -> Result<LogEntry> {
        let store = self.shared.store.lock();
        let i = checked_index(index, store.entries.len())?;
        Ok(store.entries[i].clone())
    }

    fn properties(&self) -> PropertyBag {
        let store = self.shared.store.lock();
        let mut bag = PropertyBag::new();
        bag.set(Property::Name, PropertyValue::Text(self.shared.name.clone()));
        bag.set(Property::LogEntryCount, PropertyValue::Count(store.entries.len()));
        bag.set(Property::Encoding, PropertyValue::Text(ENCODING.to_string()));
        bag.set(
            Property::PercentageProcessed,
            PropertyValue::Percentage(store.percentage),
        );
        if let Some(size) = store.size {
            bag.set(Property::Size, PropertyValue::Bytes(size));
        }
        if let Some(format) = &store.format {
            bag.set(Property::Format, PropertyValue::Text(format.clone()));
        }
        if let Some(first) = store.first_timestamp {
            bag.set(Property::StartTimestamp, PropertyValue::Timestamp(first));
        }
        if let Some(last) = store.last_timestamp {
            bag.set(Property::EndTimestamp, PropertyValue::Timestamp(last));
        }
        if let (Some(first), Some(last)) = (store.first_timestamp, store.last_timestamp) {
            bag.set(
                Property::Duration,
                PropertyValue::Duration(last.signed_duration_since(first)),
            );
        }
        if let Some(modified) = store.last_modified {
            bag.set(Property::LastModified, PropertyValue::Time(modified));
        }
        if let Some(created) = store.created {
            bag.set(Property::Created, PropertyValue::Time(created));
        }
        bag
    }

    fn add_listener(
        &self,
        listener: Arc<dyn LogFileListener>,
        max_wait: Duration,
        max_batch: usize,
    ) -> ListenerId {
        self.shared
            .listeners
            .add_listener(listener, max_wait, max_batch)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove_listener(id)
    }
}

fn run(shared: Arc<Shared>, cancel: CancelToken) {
    let span = debug_span!("tail", path = %shared.path.display());
    let _enter = span.enter();
    debug!("reader started");

    let result = panic::catch_unwind(AssertUnwindSafe(|| Tailer::new(&shared, &cancel).run()));
    let fault = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(_) => Some("reader thread panicked".to_string()),
    };

    if let Some(fault) = fault {
        error!(%fault, "reader stopped on error");
        shared.listeners.flush();
        shared.update_status(|status| status.fault = Some(fault));
    } else {
        debug!("reader stopped");
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

/// Strip the line terminator and decode, replacing invalid UTF-8.
fn decode_line(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    if end > 0 && bytes[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// State of the tailing loop, owned by the background thread.
struct Tailer<'a> {
    shared: &'a Shared,
    cancel: &'a CancelToken,
    parser: LineParser,
    /// Bytes of an incomplete last line.
    pending: Vec<u8>,
    /// Bytes read from the current file, including `pending`.
    offset: u64,
    /// A full poll passed without the file growing.
    quiet: bool,
    missing: bool,
}

impl<'a> Tailer<'a> {
    fn new(shared: &'a Shared, cancel: &'a CancelToken) -> Self {
        Self {
            shared,
            cancel,
            parser: LineParser::new(&shared.options, &shared.name),
            pending: Vec::new(),
            offset: 0,
            quiet: false,
            missing: false,
        }
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let poll = self.shared.options.poll_interval;
        while !self.cancel.is_cancelled() {
            let file = match File::open(&self.shared.path) {
                Ok(file) => file,
                Err(err) if is_transient(&err) => {
                    self.on_missing(&err);
                    if self.cancel.wait_timeout(poll) {
                        break;
                    }
                    continue;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to open {}", self.shared.path.display())
                    })
                }
            };
            debug!(reappeared = self.missing, "file opened");
            self.missing = false;
            self.offset = 0;
            self.pending.clear();

            let mut reader = BufReader::new(file);
            if !self.tail(&mut reader)? {
                break;
            }
        }
        Ok(())
    }

    /// Follow an open file. Returns `Ok(true)` if it has to be reopened and
    /// `Ok(false)` once cancelled.
    fn tail(&mut self, reader: &mut BufReader<File>) -> anyhow::Result<bool> {
        let poll = self.shared.options.poll_interval;
        loop {
            if self.cancel.is_cancelled() {
                return Ok(false);
            }

            let (lines, bytes_read) = self.read_batch(reader)?;
            if bytes_read > 0 {
                self.quiet = false;
            }
            if !lines.is_empty() {
                self.publish(lines);
                continue;
            }

            // A fragment without a newline is a line once the writer is idle.
            if self.quiet && !self.pending.is_empty() {
                let fragment = decode_line(&self.pending);
                self.pending.clear();
                self.publish(vec![fragment]);
            }
            self.end_of_section(reader)?;

            if self.cancel.wait_timeout(poll) {
                return Ok(false);
            }
            self.quiet = true;

            match fs::metadata(&self.shared.path) {
                Ok(meta) if meta.len() < self.offset => {
                    warn!(
                        size = meta.len(),
                        offset = self.offset,
                        "file was truncated, reading again from the start"
                    );
                    reader
                        .seek(SeekFrom::Start(0))
                        .context("failed to rewind truncated file")?;
                    self.offset = 0;
                    self.pending.clear();
                }
                Ok(_) => {}
                Err(err) if is_transient(&err) => {
                    self.on_missing(&err);
                    return Ok(true);
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("failed to stat {}", self.shared.path.display())
                    })
                }
            }
        }
    }

    /// Read up to [`BATCH_LINES`] complete lines.
    fn read_batch(&mut self, reader: &mut BufReader<File>) -> anyhow::Result<(Vec<String>, u64)> {
        let mut lines = Vec::new();
        let mut bytes_read = 0u64;
        while lines.len() < BATCH_LINES {
            let n = reader
                .read_until(b'\n', &mut self.pending)
                .with_context(|| format!("failed to read {}", self.shared.path.display()))?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;
            self.offset += n as u64;
            if self.pending.last() != Some(&b'\n') {
                break;
            }
            lines.push(decode_line(&self.pending));
            self.pending.clear();
        }
        Ok((lines, bytes_read))
    }

    fn publish(&mut self, lines: Vec<String>) {
        if !self.parser.format_checked {
            self.parser.format_checked = true;
            if let Some(matcher) = &self.shared.options.format_matcher {
                let initial = &lines[..lines.len().min(INITIAL_LINES)];
                if let Some(format) = matcher.try_match_format(&self.shared.path, initial) {
                    self.parser.apply_format(format);
                }
            }
        }

        let entries: Vec<LogEntry> = lines
            .into_iter()
            .map(|line| self.parser.parse(line))
            .collect();
        let added = entries.len();

        self.shared.update_status(|status| status.end_of_section = false);
        {
            let mut store = self.shared.store.lock();
            for entry in &entries {
                store.counts.add(entry.level());
                if let Some(ts) = entry.timestamp() {
                    store.first_timestamp.get_or_insert(ts);
                    store.last_timestamp = Some(ts);
                }
            }
            store.entries.extend(entries);
            store.consumed = self.offset - self.pending.len() as u64;
            store.format = self.parser.format_name.clone();
        }
        trace!(added, "entries appended");
        self.shared.listeners.notify_appended(added);
    }

    fn end_of_section(&mut self, reader: &BufReader<File>) -> anyhow::Result<()> {
        let meta = reader
            .get_ref()
            .metadata()
            .with_context(|| format!("failed to stat {}", self.shared.path.display()))?;
        let size = meta.len();
        let consumed = self.offset - self.pending.len() as u64;
        {
            let mut store = self.shared.store.lock();
            store.size = Some(size);
            store.consumed = consumed;
            store.percentage = if consumed >= size {
                Percentage::HUNDRED
            } else {
                Percentage::of(consumed, size)
            };
            store.last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
            store.created = meta.created().ok().map(DateTime::<Utc>::from);
        }
        self.shared.listeners.flush();
        self.shared.update_status(|status| status.end_of_section = true);
        Ok(())
    }

    fn on_missing(&mut self, err: &io::Error) {
        if !self.missing {
            trace!(error = %err, "file not available, waiting for it");
            self.missing = true;
        }
        self.offset = 0;
        self.pending.clear();
        self.quiet = false;
        {
            let mut store = self.shared.store.lock();
            store.size = None;
            store.percentage = Percentage::HUNDRED;
        }
        self.shared.listeners.flush();
        self.shared.update_status(|status| status.end_of_section = true);
    }
}

/// Values shared by all lines of one logical entry.
#[derive(Clone)]
struct EntryHead {
    index: EntryIndex,
    level: LevelFlags,
    timestamp: Option<NaiveDateTime>,
    elapsed: Option<chrono::Duration>,
    delta: Option<chrono::Duration>,
}

/// Turns raw lines into entries, tracking multi-line grouping and timing.
struct LineParser {
    layout: Option<TimestampLayout>,
    /// The layout came from outside and must not be re-detected.
    layout_fixed: bool,
    detection_attempts: usize,
    format_name: Option<String>,
    format_checked: bool,
    next_line: usize,
    next_entry: usize,
    first_timestamp: Option<NaiveDateTime>,
    previous_timestamp: Option<NaiveDateTime>,
    current: Option<EntryHead>,
    source_id: SourceId,
    source_name: String,
}

impl LineParser {
    fn new(options: &SourceReaderOptions, source_name: &str) -> Self {
        let layout = options.timestamp_layout.clone();
        Self {
            layout_fixed: layout.is_some(),
            format_name: layout.as_ref().map(TimestampLayout::describe),
            format_checked: layout.is_some(),
            layout,
            detection_attempts: 0,
            next_line: 0,
            next_entry: 0,
            first_timestamp: None,
            previous_timestamp: None,
            current: None,
            source_id: options.source_id,
            source_name: source_name.to_string(),
        }
    }

    fn apply_format(&mut self, format: LogFileFormat) {
        debug!(format = %format.name, "format recognized");
        self.format_name = Some(format.name);
        self.layout = format.timestamp;
        self.layout_fixed = true;
    }

    fn detect(&mut self, line: &str) {
        if self.layout_fixed || self.layout.is_some() || self.detection_attempts >= DETECTION_LINES {
            return;
        }
        self.detection_attempts += 1;
        if let Some(layout) = detect_layout(line) {
            debug!(
                column = layout.column,
                length = layout.length,
                "timestamp layout detected"
            );
            self.format_name = Some(layout.describe());
            self.layout = Some(layout);
        }
    }

    fn start_entry(&mut self, level: LevelFlags, timestamp: Option<NaiveDateTime>) -> EntryHead {
        let index = EntryIndex::from(self.next_entry);
        self.next_entry += 1;

        let (elapsed, delta) = match timestamp {
            Some(ts) => {
                let first = *self.first_timestamp.get_or_insert(ts);
                let delta = self
                    .previous_timestamp
                    .map(|previous| ts.signed_duration_since(previous));
                self.previous_timestamp = Some(ts);
                (Some(ts.signed_duration_since(first)), delta)
            }
            None => (None, None),
        };

        EntryHead {
            index,
            level,
            timestamp,
            elapsed,
            delta,
        }
    }

    fn parse(&mut self, line: String) -> LogEntry {
        self.detect(&line);
        let level = detect_level(&line);
        let timestamp = self.layout.as_ref().and_then(|layout| layout.parse(&line));

        // Without a known layout there is nothing to tell entries apart by.
        let continuation = self.layout.is_some() && timestamp.is_none() && level.is_empty();
        let head = match self.current.take() {
            Some(current) if continuation => current,
            _ => self.start_entry(level, timestamp),
        };
        self.current = Some(head.clone());

        let index = LineIndex::from(self.next_line);
        self.next_line += 1;
        let line_number = self.next_line as i64;

        LogEntry::new(&[])
            .with(columns::RAW_CONTENT, line)
            .with(columns::INDEX, index)
            .with(columns::ORIGINAL_INDEX, index)
            .with(columns::LOG_ENTRY_INDEX, head.index)
            .with(columns::LINE_NUMBER, line_number)
            .with(columns::ORIGINAL_LINE_NUMBER, line_number)
            .with(columns::TIMESTAMP, head.timestamp)
            .with(columns::ELAPSED_TIME, head.elapsed)
            .with(columns::DELTA_TIME, head.delta)
            .with(columns::LOG_LEVEL, head.level)
            .with(columns::SOURCE_ID, self.source_id)
            .with(columns::ORIGINAL_DATA_SOURCE_NAME, self.source_name.clone())
    }
}
