//! Access-log follower
//!
//! Runs on its own thread and feeds complete lines to the engine over a bounded
//! channel.

use crate::error::CollectorError;
use log::{debug, error, info, warn};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Follows a growing access log and forwards each new line
///
/// Waits for the file to appear, starts at its current end (history is never
/// replayed) and polls for appended data. Lines are handed over one at a time
/// through a bounded channel so the engine consumes them strictly in order.
pub struct LogTailer {
    /// File to follow
    path: PathBuf,
    /// Delay between reads when no new data is available
    poll_interval: Duration,
    /// Delay between existence checks before the file is created
    wait_interval: Duration,
    /// Channel to send raw lines
    output_channel: SyncSender<String>,
    /// Handle to the background thread
    thread_handle: Option<JoinHandle<()>>,
    /// Shared state for controlling the tailer
    running: Arc<Mutex<bool>>,
}

impl LogTailer {
    /// Create a new LogTailer for `path`
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use std::sync::mpsc;
    /// use poolwatch::collectors::LogTailer;
    ///
    /// let (tx, rx) = mpsc::sync_channel(1024);
    /// let mut tailer = LogTailer::new("/var/log/nginx/access.log", tx);
    /// tailer.start().unwrap();
    /// let first_line = rx.recv().unwrap();
    /// ```
    pub fn new(path: impl Into<PathBuf>, channel: SyncSender<String>) -> Self {
        Self {
            path: path.into(),
            poll_interval: Duration::from_millis(100),
            wait_interval: Duration::from_secs(2),
            output_channel: channel,
            thread_handle: None,
            running: Arc::new(Mutex::new(false)),
        }
    }

    /// Override the polling cadence
    pub fn with_intervals(mut self, poll_interval: Duration, wait_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_interval = wait_interval;
        self
    }

    /// Start following the file on a background thread
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::IoError` if the thread cannot be spawned.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        {
            let mut running = self.lock_running();
            if *running {
                return Ok(()); // Already running
            }
            *running = true;
        }

        let path = self.path.clone();
        let poll_interval = self.poll_interval;
        let wait_interval = self.wait_interval;
        let channel = self.output_channel.clone();
        let running = Arc::clone(&self.running);

        let spawned = thread::Builder::new()
            .name("log-tailer".to_string())
            .spawn(move || {
                Self::tailer_thread(path, poll_interval, wait_interval, channel, running);
            });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                info!("Starting to tail log file: {}", self.path.display());
                Ok(())
            }
            Err(e) => {
                *self.lock_running() = false;
                Err(CollectorError::IoError(e))
            }
        }
    }

    /// Stop the tailer and wait for its thread
    ///
    /// # Errors
    ///
    /// Returns `CollectorError::ThreadTerminated` if the thread panicked.
    pub fn stop(&mut self) -> Result<(), CollectorError> {
        *self.lock_running() = false;

        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| {
                CollectorError::ThreadTerminated("Failed to join tailer thread".to_string())
            })?;
        }

        info!("LogTailer stopped");
        Ok(())
    }

    /// Check if the tailer is currently running
    pub fn is_running(&self) -> bool {
        *self.lock_running()
    }

    fn lock_running(&self) -> std::sync::MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn still_running(running: &Arc<Mutex<bool>>) -> bool {
        *running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Main tailer thread function
    fn tailer_thread(
        path: PathBuf,
        poll_interval: Duration,
        wait_interval: Duration,
        channel: SyncSender<String>,
        running: Arc<Mutex<bool>>,
    ) {
        let Some(mut reader) = Self::wait_for_file(&path, wait_interval, &running) else {
            info!("Log tailer thread finished before the log file appeared");
            return;
        };

        info!("Log watcher ready - monitoring for events");

        'outer: while Self::still_running(&running) {
            match reader.read_lines() {
                Ok(lines) if lines.is_empty() => thread::sleep(poll_interval),
                Ok(lines) => {
                    for line in lines {
                        if !Self::forward(&channel, line, poll_interval, &running) {
                            break 'outer;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to read {}: {}", path.display(), e);
                    thread::sleep(poll_interval);
                }
            }
        }

        *running.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
        info!("Log tailer thread finished");
    }

    /// Block until the file can be opened, then position at its end
    fn wait_for_file(
        path: &Path,
        wait_interval: Duration,
        running: &Arc<Mutex<bool>>,
    ) -> Option<TailReader> {
        let sleep_interval = Duration::from_millis(50).min(wait_interval);

        while Self::still_running(running) {
            match File::open(path).and_then(TailReader::at_end) {
                Ok(reader) => return Some(reader),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    info!("Waiting for log file to be created: {}", path.display());
                }
                Err(e) => {
                    warn!("Cannot open {}: {}", path.display(), e);
                }
            }

            // Sleep in short intervals to allow responsive shutdown
            let mut remaining = wait_interval;
            while remaining > Duration::ZERO && Self::still_running(running) {
                let step = remaining.min(sleep_interval);
                thread::sleep(step);
                remaining = remaining.saturating_sub(step);
            }
        }
        None
    }

    /// Hand one line to the engine, waiting while the queue is full
    ///
    /// # Returns
    ///
    /// `false` once the receiver is gone or the tailer was stopped
    fn forward(
        channel: &SyncSender<String>,
        mut line: String,
        poll_interval: Duration,
        running: &Arc<Mutex<bool>>,
    ) -> bool {
        loop {
            match channel.try_send(line) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    if !Self::still_running(running) {
                        return false;
                    }
                    debug!("Line queue full, waiting for the engine");
                    line = returned;
                    thread::sleep(poll_interval);
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("Line channel closed, stopping tailer");
                    return false;
                }
            }
        }
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

/// Incremental line reader over an open file
#[derive(Debug)]
struct TailReader {
    file: File,
    /// Offset up to which the file has been consumed
    position: u64,
    /// Bytes of an unterminated trailing line
    pending: Vec<u8>,
}

impl TailReader {
    /// Start reading at the current end of `file`
    fn at_end(mut file: File) -> std::io::Result<Self> {
        let position = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            file,
            position,
            pending: Vec::new(),
        })
    }

    /// Read everything appended since the last call and return complete lines
    fn read_lines(&mut self) -> std::io::Result<Vec<String>> {
        let len = self.file.metadata()?.len();
        if len < self.position {
            warn!("Log file shrank ({} < {}), reading from the start", len, self.position);
            self.position = self.file.seek(SeekFrom::Start(0))?;
            self.pending.clear();
        }

        let read = self.file.read_to_end(&mut self.pending)?;
        self.position += read as u64;

        let mut lines = Vec::new();
        while let Some(newline) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }
}
