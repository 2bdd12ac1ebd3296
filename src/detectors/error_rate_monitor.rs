//! Upstream error-rate degradation detection
//!
//! Reads the sliding window after every record. Above the threshold the system
//! is degraded and the error-rate alert repeats once per cooldown; falling back
//! to or under the threshold while degraded is a recovery, gated by the same
//! cooldown slot as pool recovery.

use crate::aggregator::SlidingWindow;
use crate::alerts::{AlertKind, CooldownGate};
use crate::events::Timestamp;
use log::{debug, info};

/// Samples needed before the error rate is trusted
pub const MIN_SAMPLES: usize = 50;

/// Error-rate transition that passed its cooldown and should be alerted
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorRateEvent {
    /// Rate is above the threshold
    Degraded {
        error_rate: f64,
        error_count: usize,
        samples: usize,
    },
    /// Rate fell back to or under the threshold after a degradation
    Recovered { error_rate: f64 },
}

impl ErrorRateEvent {
    pub fn kind(&self) -> AlertKind {
        match self {
            ErrorRateEvent::Degraded { .. } => AlertKind::HighErrorRate,
            ErrorRateEvent::Recovered { .. } => AlertKind::ErrorRateRecovery,
        }
    }
}

/// Owner of the degraded flag
#[derive(Debug, Clone)]
pub struct ErrorRateMonitor {
    /// Error percentage that must be exceeded to degrade
    threshold: f64,
    /// Window length required before evaluating
    min_samples: usize,
    degraded: bool,
}

impl ErrorRateMonitor {
    /// Create a monitor
    ///
    /// # Arguments
    ///
    /// * `threshold` - Error-rate percentage, exclusive
    /// * `window_size` - Configured window capacity; caps the minimum sample count
    pub fn new(threshold: f64, window_size: usize) -> Self {
        Self {
            threshold,
            min_samples: MIN_SAMPLES.min(window_size.max(1)),
            degraded: false,
        }
    }

    /// Evaluate the window after an update
    ///
    /// The degraded flag only changes together with an event that passed its
    /// cooldown; the caller stamps the cooldown once the alert is dispatched.
    pub fn evaluate(
        &mut self,
        window: &SlidingWindow,
        gate: &CooldownGate,
        now: Timestamp,
    ) -> Option<ErrorRateEvent> {
        if window.len() < self.min_samples {
            return None;
        }

        let error_rate = window.error_rate();

        if error_rate > self.threshold {
            let key = AlertKind::HighErrorRate.cooldown_key()?;
            if !gate.allowed_at(key, now) {
                debug!(
                    "Error rate {:.2}% above threshold but cooldown active",
                    error_rate
                );
                return None;
            }

            self.degraded = true;
            return Some(ErrorRateEvent::Degraded {
                error_rate,
                error_count: window.error_count(),
                samples: window.len(),
            });
        }

        if !self.degraded {
            return None;
        }

        let key = AlertKind::ErrorRateRecovery.cooldown_key()?;
        if !gate.allowed_at(key, now) {
            info!("System recovery detected but cooldown active");
            return None;
        }

        self.degraded = false;
        Some(ErrorRateEvent::Recovered { error_rate })
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }
}
