// Core types
pub mod types;
pub use types::*;

pub mod config;
pub mod error;

// Logging functionality
pub mod logger;
pub use logger::init_logger;

// Graph implementation
pub mod graph;

// Deadlock detector
pub mod detector;

pub mod monitor;
pub mod reporter;
pub mod source;

// Tracked locks and the registry they feed
pub mod locks;
pub mod registry;

use crate::core::config::MonitorConfig;
use crate::core::monitor::{DeadlockMonitor, MonitorHandle};
use crate::core::reporter::render;
use crate::core::source::RegistrySource;
use anyhow::{Context, Result};

/// Reporter type used by [`Deadwatch`]
pub type BoxedReporter = Box<dyn Fn(&DeadlockEvent) + Send + 'static>;

/// Deadwatch configuration struct
///
/// Starts a monitor over the locks created with
/// [`TrackedMutex`](crate::TrackedMutex) in this process. Use
/// [`DeadlockMonitor`] directly to plug in another snapshot source.
pub struct Deadwatch {
    config: MonitorConfig,
    log_path: Option<String>,
    callback: BoxedReporter,
}

impl Default for Deadwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Deadwatch {
    /// Create a new Deadwatch with default settings
    ///
    /// By default:
    /// - Sampling every 2000 ms, 8 stack frames per thread
    /// - Logging is disabled
    /// - Events are printed to stderr
    pub fn new() -> Self {
        Deadwatch {
            config: MonitorConfig::default(),
            log_path: None,
            callback: Box::new(|event: &DeadlockEvent| eprint!("{}", render(event))),
        }
    }

    /// Use the given monitor configuration
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    /// Activate logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Set a custom callback to be invoked for every reported event
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&DeadlockEvent) + Send + 'static,
    {
        self.callback = Box::new(callback);
        self
    }

    /// Start the monitor on its background thread
    ///
    /// # Errors
    /// Returns an error if logger initialization fails or the monitor
    /// thread cannot be spawned
    pub fn start(self) -> Result<MonitorHandle<RegistrySource, BoxedReporter>> {
        if let Some(log_path) = self.log_path {
            init_logger(Some(log_path)).context("Failed to initialize logger")?;
        }

        DeadlockMonitor::new(self.config, RegistrySource::new(), self.callback)
            .spawn()
            .context("Failed to start deadlock monitor")
    }
}
