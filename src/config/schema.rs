//! Watcher configuration
//!
//! Values come from built-in defaults, an optional TOML file and environment
//! overrides, in that order. The result is validated once and never changes.

use crate::alerts::cooldown::MAX_COOLDOWN_SECONDS;
use crate::engine::EngineConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete watcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub alerts: AlertsConfig,
    pub source: SourceConfig,
}

/// Failover and error-rate detection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    /// Pool expected to serve traffic
    pub initial_pool: String,
    /// Error-rate percentage that must be exceeded to alert
    pub error_rate_threshold: f64,
    /// Number of recent requests considered for the error rate
    pub window_size: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            initial_pool: "blue".to_string(),
            error_rate_threshold: 2.0,
            window_size: 200,
        }
    }
}

/// Alert throttling and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertsConfig {
    /// Minimum seconds between two alerts of the same kind
    pub cooldown_seconds: u64,
    /// Suppress delivery until the next recovery
    pub maintenance_mode: bool,
    /// Slack-compatible incoming webhook; alerts are only logged when unset
    pub slack_webhook_url: Option<String>,
    /// Upper bound for a single webhook call
    pub delivery_timeout_seconds: u64,
    /// Alerts that may wait for the delivery thread
    pub delivery_queue_size: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300,
            maintenance_mode: false,
            slack_webhook_url: None,
            delivery_timeout_seconds: 10,
            delivery_queue_size: 64,
        }
    }
}

/// Access-log source settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Access log written by the reverse proxy
    pub log_path: PathBuf,
    /// Delay between reads when no new data is available
    pub poll_interval_ms: u64,
    /// Delay between checks while the log file does not exist yet
    pub wait_interval_ms: u64,
    /// Lines that may wait for the engine
    pub queue_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("/var/log/nginx/access.log"),
            poll_interval_ms: 100,
            wait_interval_ms: 2000,
            queue_size: 1024,
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read, `TomlError`
    /// if it is not valid TOML, or `ValidationError` for out-of-range values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.detection.initial_pool.trim().is_empty() {
            return invalid("detection.initial_pool must not be empty");
        }
        let threshold = self.detection.error_rate_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "detection.error_rate_threshold must be a positive number, got {}",
                threshold
            )));
        }
        if self.detection.window_size == 0 {
            return invalid("detection.window_size must be at least 1");
        }
        if self.alerts.cooldown_seconds > MAX_COOLDOWN_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "alerts.cooldown_seconds must be at most {}, got {}",
                MAX_COOLDOWN_SECONDS, self.alerts.cooldown_seconds
            )));
        }
        if self.alerts.delivery_timeout_seconds == 0 {
            return invalid("alerts.delivery_timeout_seconds must be at least 1");
        }
        if self.alerts.delivery_queue_size == 0 {
            return invalid("alerts.delivery_queue_size must be at least 1");
        }
        if let Some(url) = &self.alerts.slack_webhook_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return invalid("alerts.slack_webhook_url must be an http(s) URL");
            }
        }
        if self.source.poll_interval_ms == 0 || self.source.wait_interval_ms == 0 {
            return invalid("source poll and wait intervals must be at least 1ms");
        }
        if self.source.queue_size == 0 {
            return invalid("source.queue_size must be at least 1");
        }
        Ok(())
    }

    /// Settings handed to the detection engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_pool: self.detection.initial_pool.clone(),
            error_rate_threshold: self.detection.error_rate_threshold,
            window_size: self.detection.window_size,
            cooldown_seconds: self.alerts.cooldown_seconds,
            maintenance_mode: self.alerts.maintenance_mode,
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.alerts.delivery_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.source.poll_interval_ms)
    }

    pub fn wait_interval(&self) -> Duration {
        Duration::from_millis(self.source.wait_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.initial_pool, "blue");
        assert_eq!(config.detection.error_rate_threshold, 2.0);
        assert_eq!(config.detection.window_size, 200);
        assert_eq!(config.alerts.cooldown_seconds, 300);
        assert!(!config.alerts.maintenance_mode);
        assert_eq!(config.alerts.slack_webhook_url, None);
        assert_eq!(
            config.source.log_path,
            PathBuf::from("/var/log/nginx/access.log")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [detection]
            initial_pool = "green"

            [alerts]
            cooldown_seconds = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.detection.initial_pool, "green");
        assert_eq!(config.detection.window_size, 200);
        assert_eq!(config.alerts.cooldown_seconds, 60);
        assert_eq!(config.source.poll_interval_ms, 100);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[source]\nlog_path = \"/tmp/access.log\"\n\n[detection]\nwindow_size = 20"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.source.log_path, PathBuf::from("/tmp/access.log"));
        assert_eq!(config.detection.window_size, 20);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::from_file(Path::new("/nonexistent/poolwatch.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml_str("[detection\nwindow_size = ");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            "[detection]\nerror_rate_threshold = 0.0",
            "[detection]\nerror_rate_threshold = -1.5",
            "[detection]\nwindow_size = 0",
            "[detection]\ninitial_pool = \"  \"",
            "[alerts]\ndelivery_timeout_seconds = 0",
            "[alerts]\ncooldown_seconds = 10000000000000000",
            "[alerts]\nslack_webhook_url = \"hooks.slack.com/x\"",
            "[source]\nqueue_size = 0",
            "[source]\npoll_interval_ms = 0",
        ];
        for case in cases {
            assert!(
                matches!(
                    Config::from_toml_str(case),
                    Err(ConfigError::ValidationError(_))
                ),
                "expected validation error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_engine_config() {
        let mut config = Config::default();
        config.alerts.maintenance_mode = true;
        config.alerts.cooldown_seconds = 5;

        let engine = config.engine_config();
        assert_eq!(engine.initial_pool, "blue");
        assert_eq!(engine.window_size, 200);
        assert_eq!(engine.cooldown_seconds, 5);
        assert!(engine.maintenance_mode);
    }
}
