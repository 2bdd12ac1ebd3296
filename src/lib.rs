/// Error types for the watcher
pub mod error;

/// Access records and outcome classification
pub mod events;

/// Access-log source
pub mod collectors;

/// Sliding window of recent outcomes
pub mod aggregator;

/// Failover and error-rate detection
pub mod detectors;

/// Alert rendering, cooldowns and delivery
pub mod alerts;

/// Per-record orchestration
pub mod engine;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use engine::{AlertEngine, EngineConfig, EngineStats};
pub use error::{AlertError, CollectorError, ConfigError};
pub use events::LogRecord;
