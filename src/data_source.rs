//! One logical log: a tailing reader and the filtered view on top of it.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::DataSourceSettings;
use crate::entry::column::SourceId;
use crate::entry::level::{LevelCounts, LevelFlags};
use crate::error::{LogFileError, Result};
use crate::filter::{FilterChain, FilteredView, QuickFilterSettings};
use crate::properties::PropertyBag;
use crate::reader::format::FormatMatcher;
use crate::reader::{LogFile, SourceReader, SourceReaderOptions};

/// Lifecycle of a [`DataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceState {
    Created,
    /// `start` is in progress; the reader thread is not running yet.
    Starting,
    Tailing,
    Disposed,
}

struct Config {
    levels: LevelFlags,
    quick_filters: Vec<QuickFilterSettings>,
}

/// A log file together with its active filter configuration.
///
/// Changing the filters only touches the filtered view; the reader keeps its
/// position. Once disposed every operation fails with
/// [`LogFileError::InvalidState`].
pub struct DataSource {
    settings: DataSourceSettings,
    reader: Arc<SourceReader>,
    view: FilteredView,
    config: Mutex<Config>,
    state: Mutex<DataSourceState>,
}

impl DataSource {
    /// Create a source. Quick filters are validated here.
    pub fn new(settings: DataSourceSettings) -> Result<Self> {
        Self::with_options(settings, SourceId::default(), None)
    }

    pub fn with_options(
        settings: DataSourceSettings,
        source_id: SourceId,
        format_matcher: Option<Arc<dyn FormatMatcher>>,
    ) -> Result<Self> {
        let chain = build_chain(&settings.quick_filters)?;
        let reader = Arc::new(SourceReader::new(
            &settings.path,
            SourceReaderOptions {
                poll_interval: settings.poll_duration(),
                timestamp_layout: settings.timestamp_layout.clone(),
                format_matcher,
                source_id,
                name: settings.name.clone(),
            },
        ));
        let view = FilteredView::new(reader.clone(), settings.levels, chain);
        Ok(Self {
            config: Mutex::new(Config {
                levels: settings.levels,
                quick_filters: settings.quick_filters.clone(),
            }),
            settings,
            reader,
            view,
            state: Mutex::new(DataSourceState::Created),
        })
    }

    pub fn path(&self) -> &Path {
        &self.settings.path
    }

    pub fn state(&self) -> DataSourceState {
        *self.state.lock()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state() == DataSourceState::Disposed {
            return Err(LogFileError::InvalidState("data source has been disposed"));
        }
        Ok(())
    }

    /// Start tailing. Starting an already started source is a no-op.
    pub fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                DataSourceState::Created => *state = DataSourceState::Starting,
                DataSourceState::Starting | DataSourceState::Tailing => return Ok(()),
                DataSourceState::Disposed => {
                    return Err(LogFileError::InvalidState("data source has been disposed"))
                }
            }
        }

        let started = self.reader.start();
        let mut state = self.state.lock();
        match started {
            Ok(()) if *state == DataSourceState::Starting => {
                *state = DataSourceState::Tailing;
                debug!(path = %self.settings.path.display(), "data source tailing");
                Ok(())
            }
            Ok(()) => Ok(()),
            Err(err) => {
                if *state == DataSourceState::Starting {
                    *state = DataSourceState::Created;
                }
                Err(err)
            }
        }
    }

    /// Block until the reader has caught up with the file.
    pub fn wait(&self) -> Result<()> {
        self.ensure_alive()?;
        self.reader.wait()
    }

    /// The settings this source was created with, carrying the current
    /// filter configuration.
    pub fn settings(&self) -> DataSourceSettings {
        let config = self.config.lock();
        DataSourceSettings {
            levels: config.levels,
            quick_filters: config.quick_filters.clone(),
            ..self.settings.clone()
        }
    }

    pub fn level_filter(&self) -> LevelFlags {
        self.config.lock().levels
    }

    pub fn set_level_filter(&self, levels: LevelFlags) -> Result<()> {
        self.ensure_alive()?;
        self.config.lock().levels = levels;
        self.view.set_level_filter(levels);
        Ok(())
    }

    pub fn quick_filters(&self) -> Vec<QuickFilterSettings> {
        self.config.lock().quick_filters.clone()
    }

    /// Replace the quick filters. If any of them is malformed the view keeps
    /// its previous configuration.
    pub fn set_quick_filters(&self, quick_filters: Vec<QuickFilterSettings>) -> Result<()> {
        self.ensure_alive()?;
        let chain = build_chain(&quick_filters)?;
        self.config.lock().quick_filters = quick_filters;
        self.view.set_filter_chain(chain);
        Ok(())
    }

    /// Every line of the file.
    pub fn unfiltered(&self) -> Result<Arc<SourceReader>> {
        self.ensure_alive()?;
        Ok(Arc::clone(&self.reader))
    }

    /// The lines accepted by the current filters.
    pub fn filtered(&self) -> Result<&FilteredView> {
        self.ensure_alive()?;
        Ok(&self.view)
    }

    pub fn total_count(&self) -> Result<usize> {
        self.ensure_alive()?;
        Ok(self.reader.count())
    }

    pub fn filtered_count(&self) -> Result<usize> {
        self.ensure_alive()?;
        Ok(self.view.count())
    }

    /// Per-level counts over every line.
    pub fn level_counts(&self) -> Result<LevelCounts> {
        self.ensure_alive()?;
        Ok(self.reader.level_counts())
    }

    /// Per-level counts over the accepted lines.
    pub fn filtered_level_counts(&self) -> Result<LevelCounts> {
        self.ensure_alive()?;
        Ok(self.view.level_counts())
    }

    pub fn properties(&self) -> Result<PropertyBag> {
        self.ensure_alive()?;
        Ok(self.reader.properties())
    }

    /// Stop tailing and detach every listener. Idempotent.
    pub fn dispose(&self) {
        {
            let mut state = self.state.lock();
            if *state == DataSourceState::Disposed {
                return;
            }
            *state = DataSourceState::Disposed;
        }
        self.view.dispose();
        self.reader.dispose();
        debug!(path = %self.settings.path.display(), "data source disposed");
    }
}

impl Drop for DataSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn build_chain(quick_filters: &[QuickFilterSettings]) -> Result<FilterChain> {
    let filters = quick_filters
        .iter()
        .map(QuickFilterSettings::create_filter)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(FilterChain::new(filters))
}
