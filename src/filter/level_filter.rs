use super::Filter;
use crate::entry::level::LevelFlags;
use crate::entry::LogEntry;

/// Bitwise inclusion test against an entry's level.
///
/// [`LevelFlags::ALL`] accepts every entry, including ones without a
/// recognized level; any other mask only accepts entries whose level
/// intersects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFilter {
    levels: LevelFlags,
}

impl LevelFilter {
    pub fn new(levels: LevelFlags) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> LevelFlags {
        self.levels
    }

    pub fn accepts(&self, level: LevelFlags) -> bool {
        self.levels.is_all() || self.levels.intersects(level)
    }
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::new(LevelFlags::ALL)
    }
}

impl Filter for LevelFilter {
    fn matches(&self, entry: &LogEntry) -> bool {
        self.accepts(entry.level())
    }

    fn description(&self) -> String {
        format!("level {}", self.levels)
    }
}
