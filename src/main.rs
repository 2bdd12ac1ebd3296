use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use poolwatch::alerts::{
    Alert, AlertSink, BackgroundSink, ConsoleSink, DeliveryCounters, SlackWebhookSink,
};
use poolwatch::collectors::LogTailer;
use poolwatch::config::Config;
use poolwatch::engine::AlertEngine;
use poolwatch::error::ConfigError;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;

/// Command-line arguments for the access-log watcher
#[derive(Parser)]
#[command(
    name = "poolwatch",
    about = "Blue/green pool watcher - alerts on failover and upstream error rate",
    long_about = "Follows a reverse-proxy JSON access log, detects traffic failover between \
                  the primary and backup pools as well as upstream error-rate spikes, and \
                  sends rate-limited alerts to a Slack-compatible webhook."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Access log to follow, overrides the configured path
    #[arg(short, long, value_name = "FILE")]
    log_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files are handled by load_config, which falls back to defaults
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }

        if let Some(ref log_path) = self.log_path {
            if log_path.is_dir() {
                return Err(format!(
                    "Log path is a directory: {}",
                    log_path.display()
                ));
            }
        }

        Ok(())
    }
}

/// Load configuration from file (or defaults), then apply environment and CLI overrides
fn load_config(config_path: Option<&Path>, log_path: Option<&Path>) -> Result<Config, ConfigError> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(e)) => {
                    warn!("Configuration file not readable ({}), using defaults", e);
                    Config::default()
                }
                Err(e) => return Err(e),
            }
        }
        None => Config::default(),
    };

    let mut config = config.with_env_overrides()?;
    if let Some(path) = log_path {
        config.source.log_path = path.to_path_buf();
    }
    Ok(config)
}

/// Build the delivery chain for the configured webhook
///
/// Returns the worker's counters when delivery happens in the background.
fn build_sink(config: &Config) -> anyhow::Result<(Box<dyn AlertSink>, Option<Arc<DeliveryCounters>>)> {
    match &config.alerts.slack_webhook_url {
        Some(url) => {
            let webhook = SlackWebhookSink::new(url.clone(), config.delivery_timeout())
                .context("Failed to create webhook client")?;
            let sink = BackgroundSink::spawn(Box::new(webhook), config.alerts.delivery_queue_size)
                .context("Failed to start alert delivery thread")?;
            let counters = sink.counters();
            Ok((Box::new(sink), Some(counters)))
        }
        None => {
            warn!("SLACK_WEBHOOK_URL not set - alerts will be printed to console only");
            Ok((Box::new(ConsoleSink), None))
        }
    }
}

/// Wires the tailer, the engine and the alert sink together
struct Watcher {
    config: Config,
    engine: AlertEngine,
    tailer: LogTailer,
    line_receiver: Receiver<String>,
    shutdown_sender: Sender<()>,
    shutdown_receiver: Receiver<()>,
}

impl Watcher {
    fn new(config: Config) -> anyhow::Result<Self> {
        let engine_config = config.engine_config();
        info!("Alert Watcher initialized");
        info!("Initial pool: {}", engine_config.initial_pool);
        info!("Error rate threshold: {}%", engine_config.error_rate_threshold);
        info!("Window size: {} requests", engine_config.window_size);
        info!("Alert cooldown: {}s", engine_config.cooldown_seconds);
        info!("Maintenance mode: {}", engine_config.maintenance_mode);

        let (sink, counters) = build_sink(&config)?;
        let mut engine = AlertEngine::new(&engine_config, sink);
        if let Some(counters) = counters {
            engine = engine.with_delivery_counters(counters);
        }

        let (line_sender, line_receiver) = mpsc::sync_channel(config.source.queue_size);
        let tailer = LogTailer::new(config.source.log_path.clone(), line_sender)
            .with_intervals(config.poll_interval(), config.wait_interval());

        let (shutdown_sender, shutdown_receiver) = mpsc::channel();

        Ok(Self {
            config,
            engine,
            tailer,
            line_receiver,
            shutdown_sender,
            shutdown_receiver,
        })
    }

    fn start(&mut self) -> anyhow::Result<()> {
        if self.config.alerts.slack_webhook_url.is_some() {
            let startup = Alert::startup(
                &self.config.source.log_path.display().to_string(),
                self.config.detection.error_rate_threshold,
                self.config.detection.window_size,
                self.config.alerts.cooldown_seconds,
            );
            match self.engine.alert_manager().announce(&startup) {
                Ok(()) => info!("Startup alert queued"),
                Err(e) => error!("Failed to send startup alert: {}", e),
            }
        }

        self.tailer.start().context("Failed to start log tailer")?;
        Ok(())
    }

    /// Process lines one at a time until a shutdown is requested
    fn run_until_shutdown(&mut self) {
        loop {
            if self.shutdown_receiver.try_recv().is_ok() {
                info!("Shutdown signal received");
                break;
            }

            match self.line_receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => self.engine.process_line(&line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Log source disconnected");
                    break;
                }
            }
        }
    }

    /// Stop the tailer, drain the alert queue and log the final counters
    fn stop(mut self) -> anyhow::Result<()> {
        self.tailer.stop().context("Failed to stop log tailer")?;

        let stats = self.engine.finish();
        info!(
            "Processed {} requests ({} lines skipped); alerts: {} queued, {} sent, {} suppressed, {} failed",
            stats.total_requests,
            stats.skipped_lines,
            stats.alerts_queued,
            stats.alerts_delivered,
            stats.alerts_suppressed,
            stats.alerts_failed
        );
        Ok(())
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    cli.validate().map_err(anyhow::Error::msg)?;

    let config = load_config(cli.config.as_deref(), cli.log_path.as_deref())
        .context("Failed to load configuration")?;

    let mut watcher = Watcher::new(config)?;
    watcher.start()?;

    let shutdown_sender = watcher.shutdown_sender.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting signal handler")?;

    watcher.run_until_shutdown();
    watcher.stop()?;
    info!("Watcher shutdown complete");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(cli) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(config: Option<PathBuf>, log_path: Option<PathBuf>) -> Cli {
        Cli {
            config,
            log_path,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[detection]\ninitial_pool = \"green\"").unwrap();
        assert!(cli(Some(file.path().to_path_buf()), None).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let args = cli(Some(PathBuf::from("/nonexistent/poolwatch.toml")), None);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cli(Some(dir.path().to_path_buf()), None).validate().is_err());
        assert!(cli(None, Some(dir.path().to_path_buf())).validate().is_err());
    }

    #[test]
    fn test_cli_validation_no_args() {
        assert!(cli(None, None).validate().is_ok());
    }

    #[test]
    fn test_load_config_missing_file_falls_back() {
        let config = load_config(Some(Path::new("/nonexistent/poolwatch.toml")), None).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_log_path_override() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[source]\nlog_path = \"/from/file.log\"").unwrap();

        let config = load_config(Some(file.path()), Some(Path::new("/from/cli.log"))).unwrap();
        assert_eq!(config.source.log_path, PathBuf::from("/from/cli.log"));
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[detection]\nwindow_size = 0").unwrap();
        assert!(load_config(Some(file.path()), None).is_err());
    }
}
