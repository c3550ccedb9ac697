//! Snapshot sources
//!
//! A snapshot source answers one question per sampling period: what is every
//! live thread doing right now. The monitor does not care where the answer
//! comes from; this module ships two answers:
//! - [`RegistrySource`]: threads using [`TrackedMutex`](crate::TrackedMutex)
//!   in this process
//! - [`JsonFileSource`]: a JSON dump written by an external introspection
//!   tool, re-read on every capture
//!
//! Closures returning `Result<Snapshot, ObservationError>` are sources too.

mod file;

pub use file::JsonFileSource;

use crate::core::error::ObservationError;
use crate::core::registry::{LockRegistry, global_registry};
use crate::core::types::Snapshot;

/// Produces the current thread and lock state
///
/// Implementations must not block indefinitely. Returning momentarily
/// inconsistent data is fine; per-thread races are data, not errors. An
/// `Err` means no snapshot could be produced at all this time.
pub trait SnapshotSource: Send {
    fn capture(&mut self) -> Result<Snapshot, ObservationError>;
}

impl<F> SnapshotSource for F
where
    F: FnMut() -> Result<Snapshot, ObservationError> + Send,
{
    fn capture(&mut self) -> Result<Snapshot, ObservationError> {
        self()
    }
}

/// Captures the lock registry fed by tracked locks
#[derive(Debug, Clone, Copy)]
pub struct RegistrySource {
    registry: &'static LockRegistry,
}

impl Default for RegistrySource {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrySource {
    /// Source over the process-wide registry
    pub fn new() -> Self {
        RegistrySource {
            registry: global_registry(),
        }
    }

    /// Source over a specific registry
    pub fn with_registry(registry: &'static LockRegistry) -> Self {
        RegistrySource { registry }
    }
}

impl SnapshotSource for RegistrySource {
    fn capture(&mut self) -> Result<Snapshot, ObservationError> {
        Ok(self.registry.capture())
    }
}
