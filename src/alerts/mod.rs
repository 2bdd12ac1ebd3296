/// Alert rendering, throttling and delivery
pub mod alert;
pub mod alert_manager;
pub mod cooldown;
pub mod sinks;

pub use alert::{Alert, AlertKind};
pub use alert_manager::{AlertManager, DispatchOutcome};
pub use cooldown::{CooldownGate, CooldownKey};
pub use sinks::{AlertSink, BackgroundSink, ConsoleSink, DeliveryCounters, SlackWebhookSink};
