//! Core record types for the access-log watcher
//!
//! This module defines the reverse-proxy access record consumed by the engine,
//! the severity attached to outgoing alerts, and the classification of a record
//! into the effective status used for error accounting.

use crate::error::CollectorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Timestamp type for consistent time handling across the application
pub type Timestamp = DateTime<Utc>;

/// Status recorded in place of the client-visible one when any upstream attempt failed
pub const UPSTREAM_ERROR_STATUS: i64 = 502;

/// Single structured access record emitted by the reverse proxy
///
/// Proxies frequently log numbers as strings (`"status": "200"`), so every field
/// is decoded leniently: unparseable or missing values fall back to `0` / empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    /// Final status returned to the client
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: i64,
    /// Label of the pool that served the request, empty when unknown
    #[serde(default, deserialize_with = "lenient_text")]
    pub pool: String,
    /// Comma separated statuses of every upstream attempt, e.g. `"502, 200"`
    #[serde(default, deserialize_with = "lenient_text")]
    pub upstream_status: String,
}

impl LogRecord {
    /// Parse a single access-log line
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ParseError` if the line is not a JSON object.
    pub fn from_json(line: &str) -> Result<Self, CollectorError> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| CollectorError::ParseError(e.to_string()))?;

        if !value.is_object() {
            return Err(CollectorError::ParseError(format!(
                "expected a JSON object, got: {}",
                value
            )));
        }

        serde_json::from_value(value).map_err(|e| CollectorError::ParseError(e.to_string()))
    }

    /// Pool label if the record carries a non-empty one
    pub fn pool_label(&self) -> Option<&str> {
        if self.pool.is_empty() {
            None
        } else {
            Some(self.pool.as_str())
        }
    }

    /// Effective status of this record for error accounting
    pub fn effective_outcome(&self) -> i64 {
        effective_outcome(self.status, &self.upstream_status)
    }
}

/// Map a record's status and upstream attempts to the status used for error accounting
///
/// A request that succeeded on retry after an upstream failure still counts as an
/// error. Upstream tokens that fail to parse are ignored.
pub fn effective_outcome(status: i64, upstream_status: &str) -> i64 {
    let upstream_failed = upstream_status
        .split(", ")
        .filter_map(|token| token.trim().parse::<i64>().ok())
        .any(|code| code >= 500);

    if upstream_failed {
        UPSTREAM_ERROR_STATUS
    } else {
        status
    }
}

fn lenient_status<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// Severity of an outgoing alert
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational notice (startup)
    Info,
    /// Traffic moved to a backup pool
    Warning,
    /// Error rate above threshold
    Danger,
    /// Recovered
    Good,
}

impl Severity {
    /// Attachment colour understood by Slack-compatible webhooks
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Info => "#439FE0",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
            Severity::Good => "good",
        }
    }
}
