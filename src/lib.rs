//! # Deadwatch
//!
//! A background deadlock monitor.
//!
//! Deadwatch periodically samples which lock every thread is blocked on and
//! which locks it holds, builds a wait-for graph from that snapshot and
//! reports every cycle in it as a deadlock.
//!
//! ## Features
//!
//! - Strongly connected component detection: all simultaneous deadlocks,
//!   any cycle length, self-waits included
//! - Tolerates torn snapshots: unresolvable waits are dropped, never fatal
//! - Edge-triggered reporting: one report per new deadlock group
//! - Pluggable snapshot sources and reporters
//! - Tracked mutex that makes in-process locks observable
//!
//! ## Example
//!
//! ```rust,no_run
//! use deadwatch::{Deadwatch, MonitorConfig, TrackedMutex};
//!
//! let config = MonitorConfig::new().with_sample_interval_millis(500)?;
//! let monitor = Deadwatch::new()
//!     .config(config)
//!     .callback(|event| eprintln!("deadlock between {:?}", event.threads))
//!     .start()?;
//!
//! let data = TrackedMutex::new(0);
//! *data.lock() += 1;
//!
//! monitor.shutdown()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

mod core;
pub use crate::core::{
    BoxedReporter, Deadwatch,
    config::{
        DEFAULT_SAMPLE_INTERVAL_MILLIS, DEFAULT_STACK_DEPTH_LIMIT, MIN_SAMPLE_INTERVAL_MILLIS,
        MonitorConfig, RawConfig,
    },
    detector::{deadlock_handling::extract_deadlock_event, detect},
    error::{ConfigError, MonitorError, ObservationError},
    graph::{WaitEdge, WaitForGraph},
    locks::mutex::{TrackedMutex, TrackedMutexGuard},
    monitor::{DeadlockMonitor, MonitorHandle, MonitorState, SampleOutcome},
    registry::{LockRegistry, global_registry},
    reporter::{JsonLinesReporter, Reporter, StderrReporter, render},
    source::{JsonFileSource, RegistrySource, SnapshotSource},
    types::{
        DeadlockEvent, DeadlockGroup, EventKind, LockId, Snapshot, ThreadId, ThreadRecord,
        ThreadStack, get_current_thread_id,
    },
};

pub mod logger {
    //! Monitor activity log
    pub use crate::core::logger::{
        EventLogger, LogEntry, LoggerMode, MonitorEvent, SampleStats, init_logger,
    };
}
