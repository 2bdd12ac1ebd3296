/// State machines that turn the record stream into alertable transitions
pub mod error_rate_monitor;
pub mod failover_detector;

pub use error_rate_monitor::{ErrorRateEvent, ErrorRateMonitor};
pub use failover_detector::{FailoverDetector, PoolEvent, PoolState};
