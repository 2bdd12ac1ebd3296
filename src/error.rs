use thiserror::Error;

/// Errors that can occur in the log source
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to parse record: {0}")]
    ParseError(String),

    #[error("Collector thread terminated unexpectedly: {0}")]
    ThreadTerminated(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur when delivering alerts
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Failed to send notification: {0}")]
    NotificationFailed(String),

    #[error("Delivery timed out after {0}s")]
    Timeout(u64),

    #[error("Delivery queue is full")]
    QueueFull,

    #[error("Delivery worker is not running")]
    WorkerStopped,

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
