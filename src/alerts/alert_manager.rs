//! Final stop before an alert leaves the process
//!
//! Applies maintenance suppression and webhook size limits, and turns sink
//! errors into a [`DispatchOutcome`].

use crate::alerts::alert::Alert;
use crate::alerts::sinks::AlertSink;
use crate::error::AlertError;
use log::{error, info};

/// Maximum title length accepted by chat webhooks
const MAX_TITLE_BYTES: usize = 256;
/// Maximum attachment text length accepted by chat webhooks
const MAX_BODY_BYTES: usize = 3000;

/// Result of handing an alert to the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sink accepted the alert
    Delivered,
    /// Maintenance mode swallowed the alert
    Suppressed,
    /// The sink reported an error; it has been logged
    Failed,
}

/// Hands finished alerts to the configured sink
///
/// The AlertManager applies maintenance suppression and payload truncation and
/// makes sure delivery failures never propagate into the detection engine.
pub struct AlertManager {
    /// Where alerts go
    sink: Box<dyn AlertSink>,
    /// While set, alerts are logged locally instead of delivered
    maintenance_mode: bool,
}

impl AlertManager {
    /// Create a new alert manager
    ///
    /// # Arguments
    ///
    /// * `sink` - Delivery backend
    /// * `maintenance_mode` - Start with delivery suppressed
    pub fn new(sink: Box<dyn AlertSink>, maintenance_mode: bool) -> Self {
        Self {
            sink,
            maintenance_mode,
        }
    }

    /// Deliver an alert unless maintenance mode is active
    ///
    /// Never fails: sink errors are logged and reported as `DispatchOutcome::Failed`.
    pub fn dispatch(&self, alert: &Alert) -> DispatchOutcome {
        if self.maintenance_mode {
            info!("Alert suppressed (maintenance mode): {}", alert.title);
            return DispatchOutcome::Suppressed;
        }

        match self.sink.deliver(&Self::truncate(alert)) {
            Ok(()) => {
                info!("Dispatched alert: {}", alert.title);
                DispatchOutcome::Delivered
            }
            Err(e) => {
                error!("Failed to send alert '{}': {}", alert.title, e);
                DispatchOutcome::Failed
            }
        }
    }

    /// Deliver an operational notice regardless of maintenance mode
    ///
    /// # Errors
    ///
    /// Returns the sink's `AlertError` so the caller can decide how loud to be.
    pub fn announce(&self, alert: &Alert) -> Result<(), AlertError> {
        self.sink.deliver(&Self::truncate(alert))
    }

    pub fn maintenance_mode(&self) -> bool {
        self.maintenance_mode
    }

    /// Leave maintenance mode
    ///
    /// # Returns
    ///
    /// `true` if maintenance mode was active
    pub fn clear_maintenance(&mut self) -> bool {
        if !self.maintenance_mode {
            return false;
        }
        info!("Recovery detected - automatically disabling maintenance mode");
        self.maintenance_mode = false;
        true
    }

    fn truncate(alert: &Alert) -> Alert {
        Alert {
            title: Self::truncate_text(&alert.title, MAX_TITLE_BYTES),
            body: Self::truncate_text(&alert.body, MAX_BODY_BYTES),
            ..alert.clone()
        }
    }

    /// Cut text to at most `max_bytes`, ending in "..." and respecting UTF-8 boundaries
    fn truncate_text(text: &str, max_bytes: usize) -> String {
        if text.len() <= max_bytes {
            return text.to_string();
        }

        let mut cut = max_bytes.saturating_sub(3);
        while cut > 0 && !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let ellipsis = &"..."[..max_bytes.min(3)];
        format!("{}{}", &text[..cut], ellipsis)
    }
}


// Property-based tests
#[cfg(test)]
mod property_tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn prop_truncation_respects_limit(text: String, limit: u8) -> bool {
        let limit = limit as usize;
        let result = AlertManager::truncate_text(&text, limit);
        result.len() <= limit && (text.len() > limit || result == text)
    }
}
