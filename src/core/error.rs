//! Error types for configuration, observation and monitor lifecycle.

use thiserror::Error;

/// Invalid monitor configuration, raised before any sampling starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Sample interval below the enforced minimum
    #[error("sample interval must be at least {minimum} ms, got {requested} ms")]
    IntervalTooShort { requested: u64, minimum: u64 },

    /// Configuration document could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The snapshot source could not produce a snapshot for one sample
///
/// Never fatal to the monitor: the sample is skipped and the loop continues
/// at the next tick.
#[derive(Error, Debug)]
pub enum ObservationError {
    /// I/O error while reading thread state
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Thread state could not be decoded
    #[error("malformed snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    /// Host introspection is temporarily unavailable
    #[error("thread state unavailable: {0}")]
    Unavailable(String),

    /// The source panicked while capturing
    #[error("snapshot source panicked: {0}")]
    Panicked(String),
}

/// Failure to start or stop the background monitor thread
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("failed to spawn monitor thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("monitor thread panicked")]
    Join,
}
