//! Rendered alert messages
//!
//! Every alert the watcher can emit is built here so that the field sets of
//! each kind stay in one place.

use crate::alerts::cooldown::CooldownKey;
use crate::events::Severity;
use serde::{Deserialize, Serialize};

/// Kind of event an alert reports
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Traffic moved away from the serving pool
    Failover,
    /// Traffic returned to the initial pool
    PoolRecovery,
    /// Error rate rose above the threshold
    HighErrorRate,
    /// Error rate fell back to or under the threshold
    ErrorRateRecovery,
    /// Watcher started
    Startup,
}

impl AlertKind {
    /// Cooldown slot gating this kind, `None` for kinds that are never throttled
    pub fn cooldown_key(&self) -> Option<CooldownKey> {
        match self {
            AlertKind::Failover => Some(CooldownKey::Failover),
            AlertKind::PoolRecovery | AlertKind::ErrorRateRecovery => Some(CooldownKey::Recovery),
            AlertKind::HighErrorRate => Some(CooldownKey::ErrorRate),
            AlertKind::Startup => None,
        }
    }

    /// Whether firing this kind ends maintenance mode
    pub fn is_recovery(&self) -> bool {
        matches!(self, AlertKind::PoolRecovery | AlertKind::ErrorRateRecovery)
    }
}

/// A finished alert ready for delivery
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Alert {
    pub fn failover(previous_pool: &str, new_pool: &str, total_requests: u64, failover_count: u64) -> Self {
        let body = format!(
            "Pool switch detected - traffic is now being served by the backup pool.\n\n\
             - Previous Pool: *{previous_pool}*\n\
             - New Pool: *{new_pool}*\n\
             - Total Requests: {total_requests}\n\
             - Failover Count: {failover_count}\n\n\
             *Action Required:* Check the health of the *{previous_pool}* pool."
        );
        Self {
            kind: AlertKind::Failover,
            title: ":warning: - Failover Detected".to_string(),
            body,
            severity: Severity::Warning,
        }
    }

    pub fn pool_recovery(
        previous_pool: &str,
        current_pool: &str,
        total_requests: u64,
        failover_count: u64,
    ) -> Self {
        let body = format!(
            "Traffic has recovered back to the primary pool.\n\n\
             - Previous Pool: *{previous_pool}*\n\
             - Current Pool: *{current_pool}*\n\
             - Total Requests: {total_requests}\n\
             - Failover Count: {failover_count}"
        );
        Self {
            kind: AlertKind::PoolRecovery,
            title: ":white_check_mark: - Pool Recovery Detected".to_string(),
            body,
            severity: Severity::Good,
        }
    }

    pub fn high_error_rate(
        error_rate: f64,
        threshold: f64,
        error_count: usize,
        window_len: usize,
        current_pool: &str,
        total_requests: u64,
    ) -> Self {
        let body = format!(
            "Upstream error rate has exceeded the threshold.\n\n\
             - Current Error Rate: *{error_rate:.2}%*\n\
             - Threshold: {threshold}%\n\
             - Errors in Window: {error_count}/{window_len}\n\
             - Current Pool: *{current_pool}*\n\
             - Total Requests: {total_requests}\n\n\
             *Action Required:* Investigate upstream logs and consider toggling pools."
        );
        Self {
            kind: AlertKind::HighErrorRate,
            title: ":rotating_light: - High Error Rate Detected".to_string(),
            body,
            severity: Severity::Danger,
        }
    }

    pub fn error_rate_recovery(
        current_pool: &str,
        error_rate: f64,
        threshold: f64,
        total_requests: u64,
        failover_count: u64,
    ) -> Self {
        let body = format!(
            "System has recovered from high error rate.\n\n\
             - Current Pool: *{current_pool}*\n\
             - Current Error Rate: *{error_rate:.2}%*\n\
             - Threshold: {threshold}%\n\
             - Total Requests: {total_requests}\n\
             - Failover Count: {failover_count}"
        );
        Self {
            kind: AlertKind::ErrorRateRecovery,
            title: ":white_check_mark: - Pool Recovery Detected".to_string(),
            body,
            severity: Severity::Good,
        }
    }

    /// Notice sent once the watcher is running
    pub fn startup(log_path: &str, threshold: f64, window_size: usize, cooldown_seconds: u64) -> Self {
        let body = format!(
            "- Monitoring: {log_path}\n\
             - Error Threshold: {threshold}%\n\
             - Window Size: {window_size} requests\n\
             - Alert Cooldown: {cooldown_seconds}s"
        );
        Self {
            kind: AlertKind::Startup,
            title: ":information_source: - Log Watcher Started".to_string(),
            body,
            severity: Severity::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failover_fields() {
        let alert = Alert::failover("blue", "green", 120, 1);
        assert_eq!(alert.kind, AlertKind::Failover);
        assert_eq!(alert.severity, Severity::Warning);
        assert!(alert.title.contains("Failover Detected"));
        assert!(alert.body.contains("Previous Pool: *blue*"));
        assert!(alert.body.contains("New Pool: *green*"));
        assert!(alert.body.contains("Total Requests: 120"));
        assert!(alert.body.contains("Failover Count: 1"));
        assert!(alert.body.contains("Check the health of the *blue* pool"));
    }

    #[test]
    fn test_pool_recovery_fields() {
        let alert = Alert::pool_recovery("green", "blue", 300, 2);
        assert_eq!(alert.severity, Severity::Good);
        assert!(alert.title.contains("Pool Recovery Detected"));
        assert!(alert.body.contains("Previous Pool: *green*"));
        assert!(alert.body.contains("Current Pool: *blue*"));
        assert!(alert.body.contains("Total Requests: 300"));
        assert!(alert.body.contains("Failover Count: 2"));
    }

    #[test]
    fn test_high_error_rate_fields() {
        let alert = Alert::high_error_rate(12.5, 2.0, 25, 200, "green", 900);
        assert_eq!(alert.severity, Severity::Danger);
        assert!(alert.title.contains("High Error Rate Detected"));
        assert!(alert.body.contains("Current Error Rate: *12.50%*"));
        assert!(alert.body.contains("Threshold: 2%"));
        assert!(alert.body.contains("Errors in Window: 25/200"));
        assert!(alert.body.contains("Current Pool: *green*"));
        assert!(alert.body.contains("Total Requests: 900"));
    }

    #[test]
    fn test_error_rate_recovery_fields() {
        let alert = Alert::error_rate_recovery("blue", 1.5, 2.5, 1000, 3);
        assert_eq!(alert.kind, AlertKind::ErrorRateRecovery);
        assert!(alert.title.contains("Pool Recovery Detected"));
        assert!(alert.body.contains("recovered from high error rate"));
        assert!(alert.body.contains("Current Pool: *blue*"));
        assert!(alert.body.contains("Current Error Rate: *1.50%*"));
        assert!(alert.body.contains("Threshold: 2.5%"));
        assert!(alert.body.contains("Failover Count: 3"));
    }

    #[test]
    fn test_recovery_kinds_share_cooldown() {
        assert_eq!(
            AlertKind::PoolRecovery.cooldown_key(),
            AlertKind::ErrorRateRecovery.cooldown_key()
        );
        assert_eq!(AlertKind::Failover.cooldown_key(), Some(CooldownKey::Failover));
        assert_eq!(
            AlertKind::HighErrorRate.cooldown_key(),
            Some(CooldownKey::ErrorRate)
        );
        assert_eq!(AlertKind::Startup.cooldown_key(), None);
        assert!(AlertKind::ErrorRateRecovery.is_recovery());
        assert!(!AlertKind::Failover.is_recovery());
    }

    #[test]
    fn test_startup_fields() {
        let alert = Alert::startup("/var/log/nginx/access.log", 2.0, 200, 300);
        assert_eq!(alert.severity, Severity::Info);
        assert!(alert.body.contains("Window Size: 200 requests"));
        assert!(alert.body.contains("Alert Cooldown: 300s"));
    }
}
