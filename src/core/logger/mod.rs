//! Logging functionality for Deadwatch
//!
//! This module records monitor activity (loop start/stop, every sample,
//! reported deadlocks and observation failures) as JSON lines. Logging is
//! disabled until [`init_logger`] is called with a path.

mod event_logger;

pub(crate) use event_logger::{open_append, resolve_log_path};
pub use event_logger::{
    EventLogger, LogEntry, LoggerMode, MonitorEvent, SampleStats, init_logger, log_deadlock,
    log_monitor_started, log_monitor_stopped, log_observation_failure, log_sample, log_wake,
};
