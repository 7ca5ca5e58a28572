//! Config types for log sources.
//!
//! Settings arrive from the host (usually a YAML file) and are only read by
//! the core; nothing here is ever written back.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::entry::level::LevelFlags;
use crate::filter::QuickFilterSettings;
use crate::reader::timestamp::TimestampLayout;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
/// Longest accepted poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

/// Config file structure.
///
/// Unknown fields are rejected with an error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    #[serde(default)]
    pub sources: Vec<DataSourceSettings>,
}

/// Everything needed to open one log file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataSourceSettings {
    /// Path to the log file, used verbatim.
    pub path: PathBuf,
    /// Display name; defaults to the file name.
    #[serde(default)]
    pub name: Option<String>,
    /// Milliseconds to wait at end of file before checking for growth.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval: u64,
    /// Level mask, e.g. `all` or `warning|error`.
    #[serde(default = "default_levels", deserialize_with = "deserialize_levels")]
    pub levels: LevelFlags,
    #[serde(default)]
    pub quick_filters: Vec<QuickFilterSettings>,
    /// Fixed timestamp position; auto-detected when absent.
    #[serde(default)]
    pub timestamp_layout: Option<TimestampLayout>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_levels() -> LevelFlags {
    LevelFlags::ALL
}

fn deserialize_levels<'de, D>(deserializer: D) -> Result<LevelFlags, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    text.parse().map_err(serde::de::Error::custom)
}

impl DataSourceSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            name: None,
            poll_interval: DEFAULT_POLL_INTERVAL_MS,
            levels: LevelFlags::ALL,
            quick_filters: Vec::new(),
            timestamp_layout: None,
        }
    }

    pub fn poll_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval)
    }
}
