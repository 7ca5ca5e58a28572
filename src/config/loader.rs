//! Config loading.
//!
//! Loads and validates YAML config files. Paths are used as written.

use std::fs;
use std::path::Path;

use crate::config::error::ConfigError;
use crate::config::types::{CoreConfig, DataSourceSettings, MAX_POLL_INTERVAL_MS};

/// Load and validate a YAML config file.
pub fn load(path: &Path) -> Result<CoreConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_from_str(&content, path)
}

/// Parse and validate config text. `origin` is only used in error messages.
pub fn load_from_str(content: &str, origin: &Path) -> Result<CoreConfig, ConfigError> {
    let config: CoreConfig = serde_saphyr::from_str(content)
        .map_err(|e| ConfigError::from_saphyr_error(origin.to_path_buf(), e))?;

    for (i, source) in config.sources.iter().enumerate() {
        validate_source(source).map_err(|message| ConfigError::Validation {
            path: origin.to_path_buf(),
            message: format!("sources[{}]: {}", i, message),
        })?;
    }
    Ok(config)
}

/// Check one source, returning a message describing the first problem.
fn validate_source(source: &DataSourceSettings) -> Result<(), String> {
    if source.path.as_os_str().is_empty() {
        return Err("path must not be empty".to_string());
    }
    if source.poll_interval == 0 {
        return Err("poll_interval must be positive".to_string());
    }
    if source.poll_interval > MAX_POLL_INTERVAL_MS {
        return Err(format!(
            "poll_interval must be at most {} ms, got {}",
            MAX_POLL_INTERVAL_MS, source.poll_interval
        ));
    }
    for (j, filter) in source.quick_filters.iter().enumerate() {
        filter
            .create_filter()
            .map_err(|e| format!("quick_filters[{}]: {}", j, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::level::LevelFlags;
    use crate::filter::MatchType;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn origin() -> PathBuf {
        PathBuf::from("tail.yaml")
    }

    #[test]
    fn test_load_full_source() {
        let yaml = r#"
sources:
  - path: /var/log/app.log
    name: app
    poll_interval: 250
    levels: warning|error
    quick_filters:
      - value: timeout
      - value: "GET */health"
        match_type: wildcard
        ignore_case: false
        inverted: true
    timestamp_layout:
      column: 0
      length: 19
"#;
        let config = load_from_str(yaml, &origin()).unwrap();
        assert_eq!(config.sources.len(), 1);

        let source = &config.sources[0];
        assert_eq!(source.path, PathBuf::from("/var/log/app.log"));
        assert_eq!(source.name.as_deref(), Some("app"));
        assert_eq!(source.poll_interval, 250);
        assert_eq!(source.levels, LevelFlags::WARNING | LevelFlags::ERROR);
        assert_eq!(source.quick_filters.len(), 2);
        assert_eq!(source.quick_filters[0].match_type, MatchType::Substring);
        assert!(source.quick_filters[0].ignore_case);
        assert_eq!(source.quick_filters[1].match_type, MatchType::Wildcard);
        assert!(source.quick_filters[1].inverted);
        assert_eq!(
            source.timestamp_layout.as_ref().map(|l| (l.column, l.length)),
            Some((0, 19))
        );
    }

    #[test]
    fn test_defaults() {
        let config = load_from_str("sources:\n  - path: app.log\n", &origin()).unwrap();
        let source = &config.sources[0];
        assert_eq!(source.poll_interval, 100);
        assert_eq!(source.levels, LevelFlags::ALL);
        assert!(source.quick_filters.is_empty());
        assert!(source.timestamp_layout.is_none());
        assert_eq!(source, &DataSourceSettings::new("app.log"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = load_from_str("sources: []\nbogus: 1\n", &origin()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_unknown_level_rejected() {
        let yaml = "sources:\n  - path: app.log\n    levels: loud\n";
        let err = load_from_str(yaml, &origin()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let yaml = "sources:\n  - path: app.log\n    poll_interval: 0\n";
        let err = load_from_str(yaml, &origin()).unwrap_err();
        match err {
            ConfigError::Validation { message, .. } => {
                assert_eq!(message, "sources[0]: poll_interval must be positive")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_regex_rejected() {
        let yaml = r#"
sources:
  - path: app.log
    quick_filters:
      - value: "(open"
        match_type: regex
"#;
        let err = load_from_str(yaml, &origin()).unwrap_err();
        match err {
            ConfigError::Validation { message, .. } => {
                assert!(message.starts_with("sources[0]: quick_filters[0]: invalid regex"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tail.yaml");
        fs::write(&path, "sources:\n  - path: a.log\n  - path: b.log\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[1].path, PathBuf::from("b.log"));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = load(&temp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
