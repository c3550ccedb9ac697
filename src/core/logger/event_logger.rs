use crate::core::types::{DeadlockGroup, ThreadId};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// What the monitor was doing when a log entry was written
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The sampling loop started
    MonitorStarted,
    /// A snapshot was captured and analysed
    Sample,
    /// A new deadlock group was handed to the reporter
    DeadlockReported,
    /// The snapshot source failed for one sample
    ObservationFailed,
    /// An out-of-schedule sample was requested
    Wake,
    /// The sampling loop exited
    MonitorStopped,
}

/// Per-sample numbers recorded with a `Sample` entry
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SampleStats {
    /// Thread records in the snapshot
    pub threads: usize,
    /// Wait edges in the graph
    pub edges: usize,
    /// Waits dropped because no single holder was found
    pub dropped_waits: usize,
    /// Deadlock groups found
    pub groups: usize,
    /// Groups not present in the previous sample
    pub new_groups: usize,
}

/// Structure for a single log entry
#[derive(Debug, Serialize)]
pub struct LogEntry {
    /// Type of event that occurred
    pub event: MonitorEvent,
    /// Absolute timestamp of when the event occurred (seconds since Unix Epoch)
    pub timestamp: f64,
    /// Sample statistics for `Sample` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SampleStats>,
    /// Members of a reported group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<ThreadId>>,
    /// Failure text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sampling interval for `MonitorStarted` entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

impl LogEntry {
    fn now(event: MonitorEvent) -> Self {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;
        LogEntry {
            event,
            timestamp,
            stats: None,
            group: None,
            error: None,
            interval_ms: None,
        }
    }
}

/// Determines how the logger should operate
#[derive(Debug)]
pub enum LoggerMode {
    /// Logging is disabled entirely
    Disabled,
    /// Log to the specified file
    ToFile(File),
}

/// Logger for recording monitor activity as JSON lines
pub struct EventLogger {
    mode: LoggerMode,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogger {
    /// Create a new logger with logging disabled
    pub fn new() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
        }
    }

    /// Create a new logger that appends to the specified file
    ///
    /// If the file name contains "{timestamp}", it is replaced with the
    /// current time. Missing parent directories are created.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_log_path(path)?;
        let file = open_append(&path)?;
        Ok(EventLogger {
            mode: LoggerMode::ToFile(file),
        })
    }

    /// Write one entry based on the configured mode
    pub fn log_entry(&self, entry: &LogEntry) {
        if let LoggerMode::ToFile(ref file) = self.mode {
            let mut file = file;
            if let Ok(json) = serde_json::to_string(entry)
                && let Err(e) = writeln!(file, "{json}").and_then(|_| file.flush())
            {
                eprintln!("Logger write error: {e:?}");
            }
        }
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, LoggerMode::Disabled)
    }
}

/// Expand a "{timestamp}" placeholder and make sure the parent directory exists
pub(crate) fn resolve_log_path<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let raw = path.as_ref().to_string_lossy();

    #[allow(clippy::literal_string_with_formatting_args)]
    let path = if raw.contains("{timestamp}") {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace("{timestamp}", &timestamp))
    } else {
        path.as_ref().to_path_buf()
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    Ok(path)
}

pub(crate) fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

// Global logger instance
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::new());
}

/// Set the global logger to use the specified file, or disable logging if None
pub fn init_logger<P: AsRef<Path>>(path: Option<P>) -> Result<()> {
    let logger = match path {
        Some(path) => EventLogger::with_file(path).context("Failed to create logger with file")?,
        None => EventLogger::new(),
    };

    match GLOBAL_LOGGER.lock() {
        Ok(mut global) => *global = logger,
        Err(_) => anyhow::bail!("Failed to acquire lock on global logger"),
    }
    Ok(())
}

fn log(entry: LogEntry) {
    if let Ok(logger) = GLOBAL_LOGGER.lock() {
        logger.log_entry(&entry);
    }
}

pub fn log_monitor_started(interval: Duration) {
    let mut entry = LogEntry::now(MonitorEvent::MonitorStarted);
    entry.interval_ms = Some(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX));
    log(entry);
}

pub fn log_monitor_stopped() {
    log(LogEntry::now(MonitorEvent::MonitorStopped));
}

pub fn log_wake() {
    log(LogEntry::now(MonitorEvent::Wake));
}

pub fn log_sample(stats: SampleStats) {
    let mut entry = LogEntry::now(MonitorEvent::Sample);
    entry.stats = Some(stats);
    log(entry);
}

pub fn log_deadlock(group: &DeadlockGroup) {
    let mut entry = LogEntry::now(MonitorEvent::DeadlockReported);
    entry.group = Some(group.threads().to_vec());
    log(entry);
}

pub fn log_observation_failure(error: &str) {
    let mut entry = LogEntry::now(MonitorEvent::ObservationFailed);
    entry.error = Some(error.to_string());
    log(entry);
}
