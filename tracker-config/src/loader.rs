//! Layered configuration loading: compiled defaults, then an optional TOML
//! file, then environment variable overrides. Mirrors the layering order a
//! desktop daemon typically uses for its settings (schema default → on-disk
//! override → process-level override), without needing a GSettings-style
//! system service.

use crate::model::Config;
use crate::validation::{self, ConfigWarnings};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {key} has an invalid value {value:?}: {reason}")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },
}

/// Result of a full config load: the effective config plus any non-fatal
/// warnings raised along the way (out-of-range values, unknown env keys).
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    file_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            file_path: None,
            env_prefix: "TRACKER".to_string(),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Loads defaults, overlays the configured file (if any and if it
    /// exists), overlays environment variables, then validates.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let mut config = Config::default();

        if let Some(path) = &self.file_path {
            if path.exists() {
                self.merge_file(&mut config, path)?;
            }
        }

        self.merge_env(&mut config)?;

        let warnings = validation::validate(&mut config);
        Ok(ConfigLoad { config, warnings })
    }

    fn merge_file(&self, config: &mut Config, path: &Path) -> Result<(), ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let from_file: Config = toml::from_str(&text).map_err(|source| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        *config = from_file;
        Ok(())
    }

    fn merge_env(&self, config: &mut Config) -> Result<(), ConfigLoadError> {
        macro_rules! env_scalar {
            ($field:ident, $key:literal, $parse:expr) => {
                if let Some(raw) = self.env_var($key) {
                    config.$field = $parse(&raw).map_err(|reason| ConfigLoadError::InvalidEnv {
                        key: self.env_key($key),
                        value: raw.clone(),
                        reason,
                    })?;
                }
            };
        }

        env_scalar!(verbosity, "VERBOSITY", parse_u8);
        env_scalar!(initial_sleep_secs, "INITIAL_SLEEP", parse_u32);
        env_scalar!(throttle, "THROTTLE", parse_u8);
        env_scalar!(enable_monitors, "ENABLE_MONITORS", parse_bool);
        env_scalar!(low_disk_space_limit, "LOW_DISK_SPACE_LIMIT", parse_i8);
        env_scalar!(crawling_interval, "CRAWLING_INTERVAL", parse_i16);
        env_scalar!(
            removable_days_threshold,
            "REMOVABLE_DAYS_THRESHOLD",
            parse_u16
        );
        env_scalar!(index_removable_devices, "INDEX_REMOVABLE_DEVICES", parse_bool);
        env_scalar!(index_optical_discs, "INDEX_OPTICAL_DISCS", parse_bool);
        env_scalar!(index_on_battery, "INDEX_ON_BATTERY", parse_bool);
        env_scalar!(
            index_on_battery_first_time,
            "INDEX_ON_BATTERY_FIRST_TIME",
            parse_bool
        );
        env_scalar!(enable_writeback, "ENABLE_WRITEBACK", parse_bool);

        if let Some(raw) = self.env_var("INDEX_RECURSIVE_DIRECTORIES") {
            config.index_recursive_directories = split_list(&raw);
        }
        if let Some(raw) = self.env_var("INDEX_SINGLE_DIRECTORIES") {
            config.index_single_directories = split_list(&raw);
        }
        if let Some(raw) = self.env_var("IGNORED_DIRECTORIES") {
            config.ignored_directories = split_list(&raw);
        }
        if let Some(raw) = self.env_var("IGNORED_FILES") {
            config.ignored_files = split_list(&raw);
        }

        Ok(())
    }

    fn env_key(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }

    fn env_var(&self, suffix: &str) -> Option<String> {
        std::env::var(self.env_key(suffix)).ok()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_u8(raw: &str) -> Result<u8, String> {
    raw.parse().map_err(|e| format!("{e}"))
}
fn parse_u16(raw: &str) -> Result<u16, String> {
    raw.parse().map_err(|e| format!("{e}"))
}
fn parse_u32(raw: &str) -> Result<u32, String> {
    raw.parse().map_err(|e| format!("{e}"))
}
fn parse_i8(raw: &str) -> Result<i8, String> {
    raw.parse().map_err(|e| format!("{e}"))
}
fn parse_i16(raw: &str) -> Result<i16, String> {
    raw.parse().map_err(|e| format!("{e}"))
}
fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("not a boolean: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_when_no_file_present() {
        let load = ConfigLoader::new()
            .with_env_prefix("TRACKER_TEST_NONEXISTENT")
            .load()
            .unwrap();
        assert_eq!(load.config, Config::default());
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "throttle = 5\nenable_monitors = false\n").unwrap();

        let load = ConfigLoader::new()
            .with_file(&path)
            .with_env_prefix("TRACKER_TEST_FILE_OVERRIDE")
            .load()
            .unwrap();

        assert_eq!(load.config.throttle, 5);
        assert!(!load.config.enable_monitors);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "throttle = 5\n").unwrap();

        unsafe {
            std::env::set_var("TRACKER_TEST_ENV_OVERRIDE_THROTTLE", "9");
        }
        let load = ConfigLoader::new()
            .with_file(&path)
            .with_env_prefix("TRACKER_TEST_ENV_OVERRIDE")
            .load()
            .unwrap();
        unsafe {
            std::env::remove_var("TRACKER_TEST_ENV_OVERRIDE_THROTTLE");
        }

        assert_eq!(load.config.throttle, 9);
    }
}
