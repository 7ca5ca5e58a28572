use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// Bitset of log levels.
///
/// An entry carries at most one level bit (or [`LevelFlags::NONE`] when no
/// level keyword was recognized). Filters use arbitrary combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelFlags(u8);

impl LevelFlags {
    pub const NONE: Self = Self(0);
    pub const TRACE: Self = Self(1 << 0);
    pub const DEBUG: Self = Self(1 << 1);
    pub const INFO: Self = Self(1 << 2);
    pub const WARNING: Self = Self(1 << 3);
    pub const ERROR: Self = Self(1 << 4);
    pub const FATAL: Self = Self(1 << 5);
    pub const ALL: Self = Self(0b11_1111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn is_all(self) -> bool {
        self.0 & Self::ALL.0 == Self::ALL.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// The individual level bits, most verbose first.
    pub fn iter(self) -> impl Iterator<Item = LevelFlags> {
        [
            Self::TRACE,
            Self::DEBUG,
            Self::INFO,
            Self::WARNING,
            Self::ERROR,
            Self::FATAL,
        ]
        .into_iter()
        .filter(move |level| self.contains(*level))
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::NONE => "none",
            Self::TRACE => "trace",
            Self::DEBUG => "debug",
            Self::INFO => "info",
            Self::WARNING => "warning",
            Self::ERROR => "error",
            Self::FATAL => "fatal",
            Self::ALL => "all",
            _ => return None,
        })
    }
}

impl BitOr for LevelFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LevelFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LevelFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for LevelFlags {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for LevelFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.name() {
            return f.write_str(name);
        }
        let names: Vec<_> = self.iter().filter_map(LevelFlags::name).collect();
        f.write_str(&names.join("|"))
    }
}

/// Error returned when a level name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level `{0}`")]
pub struct UnknownLevel(pub String);

impl FromStr for LevelFlags {
    type Err = UnknownLevel;

    /// Parses a single level name or a `|`-separated combination.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = LevelFlags::NONE;
        for part in s.split('|').map(str::trim) {
            flags |= match part.to_ascii_lowercase().as_str() {
                "none" | "" => LevelFlags::NONE,
                "trace" => LevelFlags::TRACE,
                "debug" => LevelFlags::DEBUG,
                "info" => LevelFlags::INFO,
                "warn" | "warning" => LevelFlags::WARNING,
                "error" => LevelFlags::ERROR,
                "fatal" => LevelFlags::FATAL,
                "all" => LevelFlags::ALL,
                _ => return Err(UnknownLevel(part.to_string())),
            };
        }
        Ok(flags)
    }
}

/// Per-level entry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LevelCounts {
    pub trace: usize,
    pub debug: usize,
    pub info: usize,
    pub warning: usize,
    pub error: usize,
    pub fatal: usize,
    /// Entries without a recognized level.
    pub other: usize,
}

impl LevelCounts {
    pub fn add(&mut self, level: LevelFlags) {
        match level {
            LevelFlags::TRACE => self.trace += 1,
            LevelFlags::DEBUG => self.debug += 1,
            LevelFlags::INFO => self.info += 1,
            LevelFlags::WARNING => self.warning += 1,
            LevelFlags::ERROR => self.error += 1,
            LevelFlags::FATAL => self.fatal += 1,
            _ => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.trace + self.debug + self.info + self.warning + self.error + self.fatal + self.other
    }
}

/// Detect the level of a line from raw bytes.
///
/// Returns the first level keyword found at a word boundary within the first
/// 80 bytes. ANSI CSI sequences are skipped in place. No allocations.
pub fn detect_level_bytes(bytes: &[u8]) -> LevelFlags {
    let scan = &bytes[..bytes.len().min(80)];
    let len = scan.len();
    let mut i = 0;
    let mut after_ansi = false;

    while i < len {
        let b = scan[i];

        if b == 0x1B {
            i += 1;
            if i < len && scan[i] == b'[' {
                i += 1;
                while i < len && !(0x40..=0x7E).contains(&scan[i]) {
                    i += 1;
                }
                if i < len {
                    i += 1;
                }
            }
            after_ansi = true;
            continue;
        }

        let at_boundary = after_ansi || i == 0 || !scan[i - 1].is_ascii_alphabetic();
        after_ansi = false;

        if !at_boundary {
            i += 1;
            continue;
        }

        let level = match b | 0x20 {
            b'f' if eq_ci_word(scan, i, b"fatal") => LevelFlags::FATAL,
            b'e' if eq_ci_word(scan, i, b"error") => LevelFlags::ERROR,
            b'w' if eq_ci_word(scan, i, b"warning") || eq_ci_word(scan, i, b"warn") => {
                LevelFlags::WARNING
            }
            b'i' if eq_ci_word(scan, i, b"info") => LevelFlags::INFO,
            b'd' if eq_ci_word(scan, i, b"debug") => LevelFlags::DEBUG,
            b't' if eq_ci_word(scan, i, b"trace") => LevelFlags::TRACE,
            _ => LevelFlags::NONE,
        };
        if !level.is_empty() {
            return level;
        }

        i += 1;
    }

    LevelFlags::NONE
}

pub fn detect_level(line: &str) -> LevelFlags {
    detect_level_bytes(line.as_bytes())
}

/// Case-insensitive keyword match at `pos` with a word boundary after it.
/// Needle must be lowercase ASCII.
#[inline]
fn eq_ci_word(bytes: &[u8], pos: usize, needle: &[u8]) -> bool {
    let end = pos + needle.len();
    if end > bytes.len() {
        return false;
    }
    if !bytes[pos..end]
        .iter()
        .zip(needle)
        .all(|(b, n)| (b | 0x20) == *n)
    {
        return false;
    }
    end >= bytes.len() || !bytes[end].is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_contains_every_level() {
        for level in [
            LevelFlags::TRACE,
            LevelFlags::DEBUG,
            LevelFlags::INFO,
            LevelFlags::WARNING,
            LevelFlags::ERROR,
            LevelFlags::FATAL,
        ] {
            assert!(LevelFlags::ALL.contains(level));
        }
        assert!(LevelFlags::ALL.is_all());
        assert!(!LevelFlags::INFO.is_all());
    }

    #[test]
    fn not_stays_within_all() {
        assert_eq!(!LevelFlags::ALL, LevelFlags::NONE);
        assert_eq!(!LevelFlags::NONE, LevelFlags::ALL);
        assert!(!(!LevelFlags::INFO).intersects(LevelFlags::INFO));
    }

    #[test]
    fn parse_names() {
        assert_eq!("info".parse::<LevelFlags>().unwrap(), LevelFlags::INFO);
        assert_eq!("WARN".parse::<LevelFlags>().unwrap(), LevelFlags::WARNING);
        assert_eq!(
            "error | fatal".parse::<LevelFlags>().unwrap(),
            LevelFlags::ERROR | LevelFlags::FATAL
        );
        assert_eq!("all".parse::<LevelFlags>().unwrap(), LevelFlags::ALL);
        assert!("verbose".parse::<LevelFlags>().is_err());
    }

    #[test]
    fn display_combination() {
        assert_eq!(LevelFlags::INFO.to_string(), "info");
        assert_eq!(
            (LevelFlags::ERROR | LevelFlags::DEBUG).to_string(),
            "debug|error"
        );
    }

    #[test]
    fn counts_total() {
        let mut counts = LevelCounts::default();
        counts.add(LevelFlags::INFO);
        counts.add(LevelFlags::INFO);
        counts.add(LevelFlags::NONE);
        counts.add(LevelFlags::FATAL);
        assert_eq!(counts.info, 2);
        assert_eq!(counts.other, 1);
        assert_eq!(counts.fatal, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn detect_plain_keywords() {
        assert_eq!(detect_level("2024-01-01 ERROR boom"), LevelFlags::ERROR);
        assert_eq!(detect_level("[warn] disk almost full"), LevelFlags::WARNING);
        assert_eq!(detect_level("WARNING: deprecated"), LevelFlags::WARNING);
        assert_eq!(detect_level("info: started"), LevelFlags::INFO);
        assert_eq!(detect_level("DEBUG x=1"), LevelFlags::DEBUG);
        assert_eq!(detect_level("TRACE enter"), LevelFlags::TRACE);
        assert_eq!(detect_level("FATAL out of memory"), LevelFlags::FATAL);
    }

    #[test]
    fn detect_first_match_wins() {
        assert_eq!(detect_level("INFO retrying after error"), LevelFlags::INFO);
    }

    #[test]
    fn detect_requires_word_boundary() {
        assert_eq!(detect_level("information superhighway"), LevelFlags::NONE);
        assert_eq!(detect_level("terrors abound"), LevelFlags::NONE);
        assert_eq!(detect_level("all good"), LevelFlags::NONE);
    }

    #[test]
    fn detect_skips_ansi_sequences() {
        assert_eq!(
            detect_level("\x1b[31mERROR\x1b[0m failed"),
            LevelFlags::ERROR
        );
    }

    #[test]
    fn detect_only_scans_prefix() {
        let line = format!("{} ERROR", "x".repeat(100));
        assert_eq!(detect_level(&line), LevelFlags::NONE);
    }

    #[test]
    fn detect_empty() {
        assert_eq!(detect_level(""), LevelFlags::NONE);
    }
}
