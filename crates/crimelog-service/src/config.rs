//! Service configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crimelog_sync::SyncSettings;

/// Longest accepted debounce, in milliseconds.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage settings.
    pub storage: StorageConfig,
    /// Workbook to bind at startup.
    pub source: SourceConfig,
    /// Sync engine timing and sizing.
    pub sync: SyncSettings,
}

impl Config {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and collect every problem found.
    ///
    /// ```
    /// use crimelog_service::Config;
    ///
    /// let config = Config::default();
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.storage.validate());
        errors.extend(self.source.validate());
        errors.extend(validate_sync(&self.sync));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: crimelog_store::default_db_path(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.path".to_string(),
                message: "database path cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Data-source configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Workbook to bind at startup. Takes precedence over the saved binding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl SourceConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(path) = &self.path
            && path.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "source.path".to_string(),
                message: "workbook path cannot be empty (omit it instead)".to_string(),
            });
        }

        errors
    }
}

fn validate_sync(sync: &SyncSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let required = [
        ("sync.debounce_ms", sync.debounce_ms),
        ("sync.guard_quiet_ms", sync.guard_quiet_ms),
        ("sync.stability_ms", sync.stability_ms),
        ("sync.poll_interval_ms", sync.poll_interval_ms),
    ];
    for (field, value) in required {
        if value == 0 {
            errors.push(ValidationError {
                field: field.to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
    }

    if sync.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(ValidationError {
            field: "sync.debounce_ms".to_string(),
            message: format!(
                "debounce {} is too long (maximum {} ms)",
                sync.debounce_ms, MAX_DEBOUNCE_MS
            ),
        });
    }

    if sync.poll_interval_ms > sync.stability_ms {
        errors.push(ValidationError {
            field: "sync.poll_interval_ms".to_string(),
            message: format!(
                "poll interval {} ms exceeds the stability window {} ms",
                sync.poll_interval_ms, sync.stability_ms
            ),
        });
    }

    if sync.guard_quiet() <= sync.reaction_window() {
        errors.push(ValidationError {
            field: "sync.guard_quiet_ms".to_string(),
            message: format!(
                "guard quiet period {} ms must exceed stability + poll interval + debounce ({} ms)",
                sync.guard_quiet_ms,
                sync.reaction_window().as_millis()
            ),
        });
    }

    if sync.subscriber_buffer == 0 {
        errors.push(ValidationError {
            field: "sync.subscriber_buffer".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    errors
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with its field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `sync.debounce_ms`).
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("crimelog")
        .join("service.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(err: ConfigError) -> Vec<String> {
        match err {
            ConfigError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.storage.path, crimelog_store::default_db_path());
        assert!(config.source.path.is_none());
        assert_eq!(config.sync, SyncSettings::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let toml = r#"
            [source]
            path = "/data/crime.xlsx"

            [sync]
            debounce_ms = 250
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.path, Some(PathBuf::from("/data/crime.xlsx")));
        assert_eq!(config.sync.debounce_ms, 250);
        assert_eq!(config.sync.guard_quiet_ms, 2000);
        assert_eq!(config.storage.path, crimelog_store::default_db_path());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("service.toml");

        let config = Config {
            storage: StorageConfig {
                path: PathBuf::from("/tmp/crimelog.db"),
            },
            source: SourceConfig {
                path: Some(PathBuf::from("/tmp/crime.xlsx")),
            },
            sync: SyncSettings {
                debounce_ms: 600,
                ..SyncSettings::default()
            },
        };

        config.save(&config_path).unwrap();
        let loaded = Config::load_validated(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_without_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("service.toml");

        Config::default().save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();
        assert!(loaded.source.path.is_none());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/service.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("service.toml");
        std::fs::write(&config_path, "[sync\ndebounce_ms = ").unwrap();

        let err = Config::load(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_empty_paths() {
        let config = Config {
            storage: StorageConfig {
                path: PathBuf::new(),
            },
            source: SourceConfig {
                path: Some(PathBuf::new()),
            },
            ..Config::default()
        };
        assert_eq!(
            fields(config.validate().unwrap_err()),
            vec!["storage.path", "source.path"]
        );
    }

    #[test]
    fn test_validate_zero_durations() {
        let config = Config {
            sync: SyncSettings {
                debounce_ms: 0,
                guard_quiet_ms: 0,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert_eq!(
            fields(config.validate().unwrap_err()),
            vec!["sync.debounce_ms", "sync.guard_quiet_ms", "sync.guard_quiet_ms"]
        );
    }

    #[test]
    fn test_validate_bounds() {
        let config = Config {
            sync: SyncSettings {
                debounce_ms: MAX_DEBOUNCE_MS + 1,
                poll_interval_ms: 5000,
                subscriber_buffer: 0,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert_eq!(
            fields(config.validate().unwrap_err()),
            vec![
                "sync.debounce_ms",
                "sync.poll_interval_ms",
                "sync.guard_quiet_ms",
                "sync.subscriber_buffer"
            ]
        );
    }

    #[test]
    fn test_guard_must_outlast_watcher_reaction() {
        let short_guard = Config {
            sync: SyncSettings {
                guard_quiet_ms: 100,
                stability_ms: 1000,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert_eq!(
            fields(short_guard.validate().unwrap_err()),
            vec!["sync.guard_quiet_ms"]
        );

        // equal to the window is still too short
        let boundary = Config {
            sync: SyncSettings {
                guard_quiet_ms: 1800,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert!(boundary.validate().is_err());

        let enough = Config {
            sync: SyncSettings {
                guard_quiet_ms: 1801,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert!(enough.validate().is_ok());
    }

    #[test]
    fn test_keepalive_may_be_disabled() {
        let config = Config {
            sync: SyncSettings {
                keepalive_secs: 0,
                summary_ttl_secs: 0,
                ..SyncSettings::default()
            },
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError {
            field: "storage.path".to_string(),
            message: "database path cannot be empty".to_string(),
        }]);
        assert_eq!(
            err.to_string(),
            "Configuration validation failed:\n  - storage.path: database path cannot be empty"
        );
    }
}
