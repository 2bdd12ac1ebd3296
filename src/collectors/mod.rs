/// Follows the reverse-proxy access log
pub mod log_tailer;

pub use log_tailer::LogTailer;
