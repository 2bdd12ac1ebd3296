/// Configuration structure, file loading and validation
pub mod schema;

/// Environment variable overrides
pub mod env;

pub use schema::{AlertsConfig, Config, DetectionConfig, SourceConfig};
