//! The set of data sources a host has open.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::{CoreConfig, DataSourceSettings};
use crate::data_source::DataSource;
use crate::entry::column::SourceId;
use crate::error::Result;
use crate::reader::format::FormatMatcher;

/// Handle of a source within a [`DataSources`] collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataSourceId(u64);

impl fmt::Display for DataSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

/// Owns a group of sources. Removing a source, or dropping the collection,
/// disposes it.
#[derive(Default)]
pub struct DataSources {
    sources: Vec<(DataSourceId, Arc<DataSource>)>,
    next_id: u64,
    format_matcher: Option<Arc<dyn FormatMatcher>>,
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection whose sources consult `matcher` for their format.
    pub fn with_format_matcher(matcher: Arc<dyn FormatMatcher>) -> Self {
        let mut sources = Self::default();
        sources.format_matcher = Some(matcher);
        sources
    }

    /// Create and start a source for every entry of `config`.
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        let mut sources = Self::new();
        for settings in &config.sources {
            let id = sources.add(settings.clone())?;
            if let Some(source) = sources.get(id) {
                source.start()?;
            }
        }
        Ok(sources)
    }

    /// Create a source. It is not started.
    pub fn add(&mut self, settings: DataSourceSettings) -> Result<DataSourceId> {
        let id = DataSourceId(self.next_id);
        // Source ids tag merged lines and wrap after 256 sources.
        let source_id = SourceId((self.next_id % 256) as u8);
        let source = DataSource::with_options(settings, source_id, self.format_matcher.clone())?;
        self.next_id += 1;
        debug!(%id, path = %source.path().display(), "data source added");
        self.sources.push((id, Arc::new(source)));
        Ok(id)
    }

    /// Remove and dispose a source. Unknown ids are ignored.
    pub fn remove(&mut self, id: DataSourceId) -> bool {
        let Some(pos) = self.sources.iter().position(|(i, _)| *i == id) else {
            return false;
        };
        let (_, source) = self.sources.remove(pos);
        source.dispose();
        debug!(%id, "data source removed");
        true
    }

    pub fn get(&self, id: DataSourceId) -> Option<&Arc<DataSource>> {
        self.sources
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, source)| source)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataSourceId, &Arc<DataSource>)> {
        self.sources.iter().map(|(id, source)| (*id, source))
    }

    /// Current settings of every source, in insertion order.
    pub fn settings(&self) -> CoreConfig {
        CoreConfig {
            sources: self.sources.iter().map(|(_, s)| s.settings()).collect(),
        }
    }
}

impl Drop for DataSources {
    fn drop(&mut self) {
        for (_, source) in &self.sources {
            source.dispose();
        }
    }
}
