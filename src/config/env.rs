//! Environment overrides
//!
//! Container deployments configure the watcher through the same variables the
//! proxy stack already exports.

use crate::config::Config;
use crate::error::ConfigError;
use log::debug;
use std::path::PathBuf;
use std::str::FromStr;

pub const ACTIVE_POOL: &str = "ACTIVE_POOL";
pub const ERROR_RATE_THRESHOLD: &str = "ERROR_RATE_THRESHOLD";
pub const WINDOW_SIZE: &str = "WINDOW_SIZE";
pub const ALERT_COOLDOWN_SEC: &str = "ALERT_COOLDOWN_SEC";
pub const MAINTENANCE_MODE: &str = "MAINTENANCE_MODE";
pub const SLACK_WEBHOOK_URL: &str = "SLACK_WEBHOOK_URL";
pub const LOG_PATH: &str = "LOG_PATH";

impl Config {
    /// Apply overrides from the process environment and re-validate
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup and re-validate
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` when a numeric variable does not parse,
    /// or `ValidationError` when the merged configuration is invalid.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(pool) = lookup(ACTIVE_POOL) {
            self.detection.initial_pool = pool.trim().to_string();
        }
        if let Some(value) = lookup(ERROR_RATE_THRESHOLD) {
            self.detection.error_rate_threshold = parse_var(ERROR_RATE_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(WINDOW_SIZE) {
            self.detection.window_size = parse_var(WINDOW_SIZE, &value)?;
        }
        if let Some(value) = lookup(ALERT_COOLDOWN_SEC) {
            self.alerts.cooldown_seconds = parse_var(ALERT_COOLDOWN_SEC, &value)?;
        }
        if let Some(value) = lookup(MAINTENANCE_MODE) {
            // anything but "true" disables it
            self.alerts.maintenance_mode = value.trim().eq_ignore_ascii_case("true");
        }
        if let Some(url) = lookup(SLACK_WEBHOOK_URL) {
            let url = url.trim();
            self.alerts.slack_webhook_url = if url.is_empty() {
                None
            } else {
                Some(url.to_string())
            };
        }
        if let Some(path) = lookup(LOG_PATH) {
            self.source.log_path = PathBuf::from(path.trim());
        }

        self.validate()?;
        Ok(self)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    debug!("Overriding {} from environment", key);
    value.trim().parse().map_err(|_| {
        ConfigError::ParseError(format!("{} has an invalid value: '{}'", key, value))
    })
}
