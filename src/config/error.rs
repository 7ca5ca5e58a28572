//! Config error types.
//!
//! Errors render in Cargo style, pointing at the offending file.

use std::fmt;
use std::path::PathBuf;

/// Error loading or parsing a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading the config file.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parse error.
    Parse { path: PathBuf, message: String },

    /// Validation error (semantic errors after parsing).
    Validation { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn from_saphyr_error(path: PathBuf, error: impl fmt::Display) -> Self {
        ConfigError::Parse {
            path,
            message: error.to_string(),
        }
    }

    /// Format error in Cargo-style format.
    pub fn format_cargo_style(&self) -> String {
        match self {
            ConfigError::Io { path, source } => {
                format!(
                    "error: cannot read config file\n  --> {}\n  |\n  = {}\n",
                    path.display(),
                    source
                )
            }
            ConfigError::Parse { path, message } => {
                format!(
                    "error: invalid config file\n  --> {}\n  |\n  = {}\n",
                    path.display(),
                    message
                )
            }
            ConfigError::Validation { path, message } => {
                format!("error: {}\n  --> {}\n  |\n", message, path.display())
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_cargo_style())
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
