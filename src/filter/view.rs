//! A filtered, re-indexed view over another log file.
//!
//! The view subscribes to its source and evaluates only newly appended lines.
//! Changing the level mask or the filter chain throws the derived entries
//! away and re-evaluates everything the source currently holds, copying
//! entries out of the source's store; the underlying file is not read again.
//!
//! Locking: the pipeline lock serializes evaluation and reconfiguration. While
//! holding it, the view takes the source's lock only to copy entries and takes
//! its own store lock only to publish them; the two are never held together.
//! Listeners of the view are notified while the pipeline lock is held, so a
//! listener must not reconfigure the view it listens to from its callback.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::{Filter, FilterChain, LevelFilter};
use crate::entry::column::columns;
use crate::entry::level::{LevelCounts, LevelFlags};
use crate::entry::LogEntry;
use crate::error::Result;
use crate::index::{LineIndex, Section};
use crate::listener::{ListenerId, ListenerRegistry, LogFileListener, Modification};
use crate::properties::{Percentage, Property, PropertyBag, PropertyValue};
use crate::reader::{checked_index, checked_range, LogFile};

/// Source entries copied per evaluation step.
const EVALUATION_CHUNK: usize = 10_000;

struct Pipeline {
    levels: LevelFilter,
    chain: FilterChain,
    /// Source entries evaluated under the current configuration.
    processed: usize,
}

impl Pipeline {
    fn accepts(&self, entry: &LogEntry) -> bool {
        self.levels.matches(entry) && self.chain.matches(entry)
    }
}

#[derive(Default)]
struct FilteredStore {
    entries: Vec<LogEntry>,
    counts: LevelCounts,
}

struct ViewShared {
    source: Arc<dyn LogFile>,
    pipeline: Mutex<Pipeline>,
    store: Mutex<FilteredStore>,
    listeners: ListenerRegistry,
}

impl ViewShared {
    /// Evaluate source entries not yet seen under the current configuration.
    fn catch_up(&self, pipeline: &mut Pipeline) {
        loop {
            let available = self.source.count();
            if available <= pipeline.processed {
                return;
            }
            let count = (available - pipeline.processed).min(EVALUATION_CHUNK);
            let section = Section::new(pipeline.processed, count);
            let entries = match self.source.get_entries(section) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(%section, error = %err, "failed to copy entries from source");
                    return;
                }
            };
            pipeline.processed += count;

            let accepted: Vec<LogEntry> = entries
                .into_iter()
                .filter(|entry| pipeline.accepts(entry))
                .collect();
            if accepted.is_empty() {
                continue;
            }

            let added = accepted.len();
            {
                let mut store = self.store.lock();
                for mut entry in accepted {
                    let position = store.entries.len();
                    let original = entry.index();
                    let original_line = entry.get_or_default(columns::LINE_NUMBER);
                    entry.insert(columns::INDEX, LineIndex::from(position));
                    entry.insert(columns::ORIGINAL_INDEX, original);
                    entry.insert(columns::LINE_NUMBER, position as i64 + 1);
                    entry.insert(columns::ORIGINAL_LINE_NUMBER, original_line);
                    store.counts.add(entry.level());
                    store.entries.push(entry);
                }
            }
            trace!(added, "filtered entries appended");
            self.listeners.notify_appended(added);
        }
    }

    /// Drop every derived entry and evaluate the source from the start.
    fn rebuild(&self, pipeline: &mut Pipeline) {
        pipeline.processed = 0;
        {
            let mut store = self.store.lock();
            store.entries.clear();
            store.counts = LevelCounts::default();
        }
        self.listeners.reset();
        self.catch_up(pipeline);
        self.listeners.flush();
    }

    fn on_source_modified(&self, modification: Modification) {
        let mut pipeline = self.pipeline.lock();
        match modification {
            Modification::Appended(_) => self.catch_up(&mut pipeline),
            Modification::Reset => self.rebuild(&mut pipeline),
        }
    }

    /// The source delivered its pending batches; do the same for ours.
    fn on_source_flushed(&self) {
        let mut pipeline = self.pipeline.lock();
        self.catch_up(&mut pipeline);
        self.listeners.flush();
    }
}

/// Subscription handed to the source. Holds the view weakly so the source's
/// registry does not keep a dropped view alive.
struct SourceListener {
    view: Weak<ViewShared>,
}

impl LogFileListener for SourceListener {
    fn on_modified(&self, modification: Modification) {
        if let Some(view) = self.view.upgrade() {
            view.on_source_modified(modification);
        }
    }

    fn on_flush(&self) {
        if let Some(view) = self.view.upgrade() {
            view.on_source_flushed();
        }
    }
}

/// The subset of a source's entries accepted by a level mask and a filter
/// chain, in source order and indexed from zero.
///
/// Each entry's `OriginalIndex` points back at its position in the source.
pub struct FilteredView {
    shared: Arc<ViewShared>,
    subscription: Mutex<Option<ListenerId>>,
}

impl FilteredView {
    pub fn new(source: Arc<dyn LogFile>, levels: LevelFlags, chain: FilterChain) -> Self {
        let shared = Arc::new(ViewShared {
            source: Arc::clone(&source),
            pipeline: Mutex::new(Pipeline {
                levels: LevelFilter::new(levels),
                chain,
                processed: 0,
            }),
            store: Mutex::new(FilteredStore::default()),
            listeners: ListenerRegistry::new(),
        });
        let listener = Arc::new(SourceListener {
            view: Arc::downgrade(&shared),
        });
        // Reports lines the source already holds right away.
        let id = source.add_listener(listener, Duration::ZERO, EVALUATION_CHUNK);
        Self {
            shared,
            subscription: Mutex::new(Some(id)),
        }
    }

    /// View that accepts everything.
    pub fn unfiltered(source: Arc<dyn LogFile>) -> Self {
        Self::new(source, LevelFlags::ALL, FilterChain::default())
    }

    pub fn source(&self) -> &Arc<dyn LogFile> {
        &self.shared.source
    }

    pub fn level_filter(&self) -> LevelFlags {
        self.shared.pipeline.lock().levels.levels()
    }

    /// Human readable form of the active configuration.
    pub fn description(&self) -> String {
        let pipeline = self.shared.pipeline.lock();
        format!(
            "{} and {}",
            pipeline.levels.description(),
            pipeline.chain.description()
        )
    }

    pub fn set_level_filter(&self, levels: LevelFlags) {
        let mut pipeline = self.shared.pipeline.lock();
        debug!(%levels, "level filter changed");
        pipeline.levels = LevelFilter::new(levels);
        self.shared.rebuild(&mut pipeline);
    }

    pub fn set_filter_chain(&self, chain: FilterChain) {
        let mut pipeline = self.shared.pipeline.lock();
        debug!(filters = chain.len(), "filter chain changed");
        pipeline.chain = chain;
        self.shared.rebuild(&mut pipeline);
    }

    /// Replace both parts of the configuration with a single re-evaluation.
    pub fn reconfigure(&self, levels: LevelFlags, chain: FilterChain) {
        let mut pipeline = self.shared.pipeline.lock();
        debug!(%levels, filters = chain.len(), "filter reconfigured");
        pipeline.levels = LevelFilter::new(levels);
        pipeline.chain = chain;
        self.shared.rebuild(&mut pipeline);
    }

    /// Per-level counts of the accepted entries.
    pub fn level_counts(&self) -> LevelCounts {
        self.shared.store.lock().counts
    }

    /// Stop following the source and drop every listener. Idempotent.
    pub fn dispose(&self) {
        if let Some(id) = self.subscription.lock().take() {
            self.shared.source.remove_listener(id);
        }
        self.shared.listeners.clear();
    }
}

impl Drop for FilteredView {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl LogFile for FilteredView {
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

    /// The source's properties, with the count and progress of the view.
    fn properties(&self) -> PropertyBag {
        let mut bag = self.shared.source.properties();
        let source_count = bag.count().unwrap_or(0);
        let processed = self.shared.pipeline.lock().processed;
        let percentage = if processed >= source_count {
            bag.percentage_processed()
        } else {
            Percentage::of(processed as u64, source_count as u64)
        };
        bag.set(Property::LogEntryCount, PropertyValue::Count(self.count()));
        bag.set(Property::PercentageProcessed, PropertyValue::Percentage(percentage));
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
