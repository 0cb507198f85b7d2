//! Non-fatal validation of a loaded [`Config`](crate::model::Config).
//!
//! Out-of-range values are reported as warnings and clamped rather than
//! rejected outright, matching the daemon's tolerance for a slightly wrong
//! settings file: a typo in `throttle` shouldn't keep the index from ever
//! starting.

use crate::model::Config;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigWarnings(pub Vec<ConfigWarning>);

impl ConfigWarnings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(ConfigWarning {
            field,
            message: message.into(),
        });
    }
}

/// Validates `config` in place, clamping out-of-range values and collecting
/// a warning per clamp. `config.normalize()` is always called afterwards so
/// cross-field constraints hold even if nothing was out of range.
pub fn validate(config: &mut Config) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    if config.verbosity > 3 {
        warnings.push(
            "verbosity",
            format!("{} out of range 0..=3, clamped to 3", config.verbosity),
        );
        config.verbosity = 3;
    }

    if config.throttle > 20 {
        warnings.push(
            "throttle",
            format!("{} out of range 0..=20, clamped to 20", config.throttle),
        );
        config.throttle = 20;
    }

    if config.initial_sleep_secs > 1000 {
        warnings.push(
            "initial_sleep_secs",
            format!(
                "{} out of range 0..=1000, clamped to 1000",
                config.initial_sleep_secs
            ),
        );
        config.initial_sleep_secs = 1000;
    }

    if config.low_disk_space_limit < -1 || config.low_disk_space_limit > 100 {
        warnings.push(
            "low_disk_space_limit",
            format!(
                "{} out of range -1..=100, clamped",
                config.low_disk_space_limit
            ),
        );
        config.low_disk_space_limit = config.low_disk_space_limit.clamp(-1, 100);
    }

    if config.crawling_interval < -2 || config.crawling_interval > 365 {
        warnings.push(
            "crawling_interval",
            format!(
                "{} out of range -2..=365, clamped",
                config.crawling_interval
            ),
        );
        config.crawling_interval = config.crawling_interval.clamp(-2, 365);
    }

    if config.removable_days_threshold > 365 {
        warnings.push(
            "removable_days_threshold",
            format!(
                "{} out of range 0..=365, clamped to 365",
                config.removable_days_threshold
            ),
        );
        config.removable_days_threshold = 365;
    }

    config.normalize();
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_out_of_range_fields_and_warns() {
        let mut config = Config {
            verbosity: 9,
            throttle: 99,
            low_disk_space_limit: -5,
            crawling_interval: 1000,
            removable_days_threshold: 9000,
            ..Config::default()
        };

        let warnings = validate(&mut config);

        assert_eq!(config.verbosity, 3);
        assert_eq!(config.throttle, 20);
        assert_eq!(config.low_disk_space_limit, -1);
        assert_eq!(config.crawling_interval, 365);
        assert_eq!(config.removable_days_threshold, 365);
        assert_eq!(warnings.0.len(), 5);
    }

    #[test]
    fn forces_optical_off_when_removable_disabled() {
        let mut config = Config {
            index_removable_devices: false,
            index_optical_discs: true,
            ..Config::default()
        };

        let warnings = validate(&mut config);

        assert!(!config.index_optical_discs);
        assert!(warnings.is_empty());
    }
}
