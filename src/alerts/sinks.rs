//! Alert delivery backends
//!
//! The engine only needs "deliver this alert"; everything about the transport
//! lives behind [`AlertSink`].

use crate::alerts::alert::Alert;
use crate::error::AlertError;
use chrono::Utc;
use log::{debug, error, info, warn};
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Capability to deliver a finished alert somewhere
#[cfg_attr(test, mockall::automock)]
pub trait AlertSink: Send {
    /// Deliver one alert, reporting failure as an error value
    fn deliver(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Sink used when no webhook is configured: alerts only reach the local log
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl AlertSink for ConsoleSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        warn!("ALERT {}: {}", alert.title, alert.body);
        Ok(())
    }
}

/// Slack-compatible incoming webhook
///
/// Owns a current-thread tokio runtime so it can be driven from plain threads.
/// Must not be called from inside another tokio runtime.
pub struct SlackWebhookSink {
    client: Client,
    webhook_url: String,
    timeout: Duration,
    runtime: tokio::runtime::Runtime,
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    attachments: [SlackAttachment<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SlackAttachment<'a> {
    color: &'a str,
    title: &'a str,
    text: &'a str,
    footer: String,
}

impl SlackWebhookSink {
    /// Create a webhook sink
    ///
    /// # Arguments
    ///
    /// * `webhook_url` - Incoming webhook URL
    /// * `timeout` - Upper bound for a single delivery, including connect time
    ///
    /// # Errors
    ///
    /// Returns `AlertError` if the HTTP client or its runtime cannot be built.
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder().timeout(timeout).build()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client,
            webhook_url,
            timeout,
            runtime,
        })
    }

    fn payload(alert: &Alert) -> SlackPayload<'_> {
        SlackPayload {
            attachments: [SlackAttachment {
                color: alert.severity.color(),
                title: &alert.title,
                text: &alert.body,
                footer: format!("Time: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
            }],
        }
    }
}

impl AlertSink for SlackWebhookSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        let payload = Self::payload(alert);
        debug!("Posting alert to webhook: {}", alert.title);

        self.runtime.block_on(async {
            let request = self.client.post(&self.webhook_url).json(&payload).send();
            let response = tokio::time::timeout(self.timeout, request)
                .await
                .map_err(|_| AlertError::Timeout(self.timeout.as_secs()))??;

            let status = response.status();
            if !status.is_success() {
                let text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AlertError::NotificationFailed(format!(
                    "webhook returned {}: {}",
                    status, text
                )));
            }
            Ok::<(), AlertError>(())
        })
    }
}

/// Outcomes of deliveries that complete after `deliver` returned
#[derive(Debug, Default)]
pub struct DeliveryCounters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryCounters {
    fn record(&self, result: &Result<(), AlertError>) {
        let counter = match result {
            Ok(()) => &self.delivered,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Alerts the backend confirmed
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Alerts the backend rejected or never answered
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Runs another sink on a dedicated delivery thread
///
/// `deliver` only enqueues onto a bounded channel, so a slow or failing backend
/// never blocks record processing. The worker logs every result and tallies it
/// in [`DeliveryCounters`].
pub struct BackgroundSink {
    sender: Option<SyncSender<Alert>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<DeliveryCounters>,
}

impl BackgroundSink {
    /// Spawn the delivery thread
    ///
    /// # Arguments
    ///
    /// * `inner` - Sink that performs the actual delivery
    /// * `queue_size` - Number of alerts that may wait for delivery
    ///
    /// # Errors
    ///
    /// Returns `AlertError::IoError` if the thread cannot be spawned.
    pub fn spawn(inner: Box<dyn AlertSink>, queue_size: usize) -> Result<Self, AlertError> {
        let (sender, receiver) = mpsc::sync_channel::<Alert>(queue_size.max(1));
        let counters = Arc::new(DeliveryCounters::default());
        let worker_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name("alert-delivery".to_string())
            .spawn(move || {
                info!("Alert delivery thread started");
                for alert in receiver {
                    let result = inner.deliver(&alert);
                    match &result {
                        Ok(()) => info!("Alert sent: {}", alert.title),
                        Err(e) => error!("Failed to send alert '{}': {}", alert.title, e),
                    }
                    worker_counters.record(&result);
                }
                info!("Alert delivery thread stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
            counters,
        })
    }

    /// Shared tally of the worker's delivery results
    pub fn counters(&self) -> Arc<DeliveryCounters> {
        Arc::clone(&self.counters)
    }

    /// Stop accepting alerts and wait for queued ones to be delivered
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Alert delivery thread panicked");
            }
        }
    }
}

impl AlertSink for BackgroundSink {
    fn deliver(&self, alert: &Alert) -> Result<(), AlertError> {
        let sender = self.sender.as_ref().ok_or(AlertError::WorkerStopped)?;
        match sender.try_send(alert.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(AlertError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(AlertError::WorkerStopped),
        }
    }
}

impl Drop for BackgroundSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}
