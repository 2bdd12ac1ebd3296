//! Per-record orchestration of the detection pipeline
//!
//! Each record flows through classification, the sliding window, the failover
//! detector and the error-rate monitor. Transitions that pass their cooldown are
//! rendered, handed to the [`AlertManager`] and only then stamped, so a
//! suppressed event never resets its own timer.

use crate::aggregator::SlidingWindow;
use crate::alerts::{Alert, AlertManager, AlertSink, CooldownGate, DeliveryCounters, DispatchOutcome};
use crate::detectors::{ErrorRateEvent, ErrorRateMonitor, FailoverDetector, PoolEvent};
use crate::events::{LogRecord, Timestamp};
use chrono::Utc;
use log::debug;
use std::sync::Arc;

/// Detection settings, fixed for the lifetime of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Primary pool traffic is expected to be served from
    pub initial_pool: String,
    /// Error-rate percentage that must be exceeded to alert
    pub error_rate_threshold: f64,
    /// Number of recent requests in the error-rate window
    pub window_size: usize,
    /// Minimum seconds between two alerts of the same kind
    pub cooldown_seconds: u64,
    /// Start with delivery suppressed
    pub maintenance_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_pool: "blue".to_string(),
            error_rate_threshold: 2.0,
            window_size: 200,
            cooldown_seconds: 300,
            maintenance_mode: false,
        }
    }
}

/// Counters describing what the engine has seen and sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Records processed
    pub total_requests: u64,
    /// Lines dropped because they were not valid records
    pub skipped_lines: u64,
    /// Alerts handed to a background delivery queue, outcome pending
    pub alerts_queued: u64,
    /// Alerts the sink confirmed
    pub alerts_delivered: u64,
    /// Alerts swallowed by maintenance mode
    pub alerts_suppressed: u64,
    /// Alerts the sink rejected, inline or from the delivery queue
    pub alerts_failed: u64,
}

/// Single-threaded owner of all detection state
pub struct AlertEngine {
    window: SlidingWindow,
    failover: FailoverDetector,
    error_rate: ErrorRateMonitor,
    cooldowns: CooldownGate,
    alerts: AlertManager,
    stats: EngineStats,
    delivery: Option<Arc<DeliveryCounters>>,
}

impl AlertEngine {
    /// Create an engine delivering through `sink`
    pub fn new(config: &EngineConfig, sink: Box<dyn AlertSink>) -> Self {
        Self::with_manager(config, AlertManager::new(sink, config.maintenance_mode))
    }

    /// Create an engine around an existing alert manager
    pub fn with_manager(config: &EngineConfig, alerts: AlertManager) -> Self {
        Self {
            window: SlidingWindow::new(config.window_size),
            failover: FailoverDetector::new(config.initial_pool.clone()),
            error_rate: ErrorRateMonitor::new(config.error_rate_threshold, config.window_size),
            cooldowns: CooldownGate::new(config.cooldown_seconds),
            alerts,
            stats: EngineStats::default(),
            delivery: None,
        }
    }

    /// Report delivery results from a sink that finishes delivery asynchronously
    ///
    /// Accepted alerts then count as queued; confirmed and failed deliveries are
    /// read from `counters`, which also include alerts announced outside the engine.
    pub fn with_delivery_counters(mut self, counters: Arc<DeliveryCounters>) -> Self {
        self.delivery = Some(counters);
        self
    }

    /// Parse and process one raw access-log line
    ///
    /// Lines that are not JSON objects are counted as skipped and otherwise ignored.
    pub fn process_line(&mut self, line: &str) {
        self.process_line_at(line, Utc::now());
    }

    pub fn process_line_at(&mut self, line: &str, now: Timestamp) {
        match LogRecord::from_json(line) {
            Ok(record) => self.process_record_at(&record, now),
            Err(e) => {
                self.stats.skipped_lines += 1;
                debug!("Skipping line '{}': {}", line, e);
            }
        }
    }

    pub fn process_record(&mut self, record: &LogRecord) {
        self.process_record_at(record, Utc::now());
    }

    /// Process one record as if it arrived at `now`
    pub fn process_record_at(&mut self, record: &LogRecord, now: Timestamp) {
        self.stats.total_requests += 1;
        self.window.push(record.effective_outcome());

        if let Some(pool) = record.pool_label() {
            if let Some(event) = self.failover.observe(pool, &self.cooldowns, now) {
                let alert = self.render_pool_event(&event);
                self.fire(alert, now);
            }
        }

        if let Some(event) = self.error_rate.evaluate(&self.window, &self.cooldowns, now) {
            let alert = self.render_error_rate_event(&event);
            self.fire(alert, now);
        }
    }

    fn render_pool_event(&self, event: &PoolEvent) -> Alert {
        let total = self.stats.total_requests;
        let count = self.failover.failover_count();
        match event {
            PoolEvent::Recovered { previous, current } => {
                Alert::pool_recovery(previous, current, total, count)
            }
            PoolEvent::FailedOver { previous, current } => {
                Alert::failover(previous, current, total, count)
            }
        }
    }

    fn render_error_rate_event(&self, event: &ErrorRateEvent) -> Alert {
        let threshold = self.error_rate.threshold();
        let pool = self.failover.current_pool();
        let total = self.stats.total_requests;
        match *event {
            ErrorRateEvent::Degraded {
                error_rate,
                error_count,
                samples,
            } => Alert::high_error_rate(error_rate, threshold, error_count, samples, pool, total),
            ErrorRateEvent::Recovered { error_rate } => Alert::error_rate_recovery(
                pool,
                error_rate,
                threshold,
                total,
                self.failover.failover_count(),
            ),
        }
    }

    /// Dispatch an alert whose cooldown already allowed it, then stamp the cooldown
    fn fire(&mut self, alert: Alert, now: Timestamp) {
        if alert.kind.is_recovery() {
            self.alerts.clear_maintenance();
        }

        match self.alerts.dispatch(&alert) {
            DispatchOutcome::Delivered if self.delivery.is_some() => self.stats.alerts_queued += 1,
            DispatchOutcome::Delivered => self.stats.alerts_delivered += 1,
            DispatchOutcome::Suppressed => self.stats.alerts_suppressed += 1,
            DispatchOutcome::Failed => self.stats.alerts_failed += 1,
        }

        // the attempt, not the delivery, consumes the cooldown
        if let Some(key) = alert.kind.cooldown_key() {
            self.cooldowns.stamp_at(key, now);
        }
    }

    pub fn stats(&self) -> EngineStats {
        merge_delivery(self.stats, self.delivery.as_deref())
    }

    /// Release the alert sink, waiting for queued deliveries, and return the final stats
    pub fn finish(self) -> EngineStats {
        let AlertEngine {
            alerts,
            stats,
            delivery,
            ..
        } = self;
        drop(alerts);
        merge_delivery(stats, delivery.as_deref())
    }

    pub fn current_pool(&self) -> &str {
        self.failover.current_pool()
    }

    pub fn failover_count(&self) -> u64 {
        self.failover.failover_count()
    }

    pub fn is_degraded(&self) -> bool {
        self.error_rate.is_degraded()
    }

    pub fn maintenance_mode(&self) -> bool {
        self.alerts.maintenance_mode()
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn cooldowns(&self) -> &CooldownGate {
        &self.cooldowns
    }

    pub fn alert_manager(&self) -> &AlertManager {
        &self.alerts
    }
}

fn merge_delivery(mut stats: EngineStats, delivery: Option<&DeliveryCounters>) -> EngineStats {
    if let Some(counters) = delivery {
        stats.alerts_delivered += counters.delivered();
        stats.alerts_failed += counters.failed();
    }
    stats
}
