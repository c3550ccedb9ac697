//! Monitor configuration
//!
//! Two options drive the monitor: the sampling interval and how many stack
//! frames are reported per thread. Validation happens when the value is
//! built, so a [`MonitorConfig`] that exists is always valid and the loop
//! never has to re-check it.

use crate::core::error::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Smallest accepted sampling interval in milliseconds
pub const MIN_SAMPLE_INTERVAL_MILLIS: u64 = 100;
/// Sampling interval used when none is configured
pub const DEFAULT_SAMPLE_INTERVAL_MILLIS: u64 = 2000;
/// Frames reported per thread when none is configured
pub const DEFAULT_STACK_DEPTH_LIMIT: usize = 8;

/// Validated monitor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    sample_interval: Duration,
    stack_depth_limit: usize,
    report_observation_failures: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MILLIS),
            stack_depth_limit: DEFAULT_STACK_DEPTH_LIMIT,
            report_observation_failures: true,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with default settings
    ///
    /// By default:
    /// - Sampling every 2000 ms
    /// - 8 stack frames per reported thread
    /// - Observation failures are forwarded to the reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling interval
    ///
    /// # Errors
    /// Returns [`ConfigError::IntervalTooShort`] if `millis` is below
    /// [`MIN_SAMPLE_INTERVAL_MILLIS`].
    pub fn with_sample_interval_millis(mut self, millis: u64) -> Result<Self, ConfigError> {
        if millis < MIN_SAMPLE_INTERVAL_MILLIS {
            return Err(ConfigError::IntervalTooShort {
                requested: millis,
                minimum: MIN_SAMPLE_INTERVAL_MILLIS,
            });
        }
        self.sample_interval = Duration::from_millis(millis);
        Ok(self)
    }

    /// Set how many frames are reported per thread
    ///
    /// Only affects reports. Graph construction and cycle detection never
    /// look at stacks.
    pub fn with_stack_depth_limit(mut self, frames: usize) -> Self {
        self.stack_depth_limit = frames;
        self
    }

    /// Choose whether `OBSERVATION_FAILED` events reach the reporter
    pub fn with_observation_failure_reports(mut self, enabled: bool) -> Self {
        self.report_observation_failures = enabled;
        self
    }

    pub fn sample_interval(&self) -> Duration {
        self.sample_interval
    }

    pub fn stack_depth_limit(&self) -> usize {
        self.stack_depth_limit
    }

    pub fn report_observation_failures(&self) -> bool {
        self.report_observation_failures
    }

    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        raw.try_into()
    }

    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the configuration is invalid
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_json_str(&json)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }
}

/// Configuration as written by a user, before validation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawConfig {
    pub sample_interval_millis: Option<u64>,
    pub stack_depth_limit: Option<usize>,
    pub report_observation_failures: Option<bool>,
}

impl TryFrom<RawConfig> for MonitorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let mut config = MonitorConfig::default();
        if let Some(millis) = raw.sample_interval_millis {
            config = config.with_sample_interval_millis(millis)?;
        }
        if let Some(frames) = raw.stack_depth_limit {
            config = config.with_stack_depth_limit(frames);
        }
        if let Some(enabled) = raw.report_observation_failures {
            config = config.with_observation_failure_reports(enabled);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.sample_interval(), Duration::from_millis(2000));
        assert_eq!(config.stack_depth_limit(), 8);
        assert!(config.report_observation_failures());
    }

    #[test]
    fn test_interval_below_minimum_is_rejected() {
        let err = MonitorConfig::new()
            .with_sample_interval_millis(50)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::IntervalTooShort {
                requested: 50,
                minimum: 100
            }
        ));
        assert!(err.to_string().contains("at least 100 ms"));
    }

    #[test]
    fn test_interval_at_minimum_is_accepted() {
        let config = MonitorConfig::new().with_sample_interval_millis(100).unwrap();
        assert_eq!(config.sample_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_json_document() {
        let config =
            MonitorConfig::from_json_str(r#"{"sampleIntervalMillis": 250, "stackDepthLimit": 3}"#)
                .unwrap();
        assert_eq!(config.sample_interval(), Duration::from_millis(250));
        assert_eq!(config.stack_depth_limit(), 3);

        let empty = MonitorConfig::from_json_str("{}").unwrap();
        assert_eq!(empty, MonitorConfig::default());
    }

    #[test]
    fn test_json_document_validation() {
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"sampleIntervalMillis": 99}"#),
            Err(ConfigError::IntervalTooShort { .. })
        ));
        assert!(matches!(
            MonitorConfig::from_json_str(r#"{"sleepTime": 500}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("deadwatch.json");
        std::fs::write(&path, r#"{"reportObservationFailures": false}"#).unwrap();

        let config = MonitorConfig::from_json_file(&path).unwrap();
        assert!(!config.report_observation_failures());

        assert!(MonitorConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
