//! Reporter sinks
//!
//! The monitor hands every event to a [`Reporter`]. Closures taking a
//! `&DeadlockEvent` are reporters, so tests and embedders can plug in a
//! channel or a callback without a wrapper type.

use crate::core::logger::{open_append, resolve_log_path};
use crate::core::types::{DeadlockEvent, EventKind};
use anyhow::Result;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Destination for monitor events
///
/// Called only from the monitor thread. Failures inside the sink are the
/// sink's concern; `report` has nothing to return.
pub trait Reporter: Send {
    fn report(&self, event: &DeadlockEvent);
}

impl<F> Reporter for F
where
    F: Fn(&DeadlockEvent) + Send,
{
    fn report(&self, event: &DeadlockEvent) {
        self(event)
    }
}

/// Writes a human readable block per event to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, event: &DeadlockEvent) {
        eprint!("{}", render(event));
    }
}

/// Format an event the way [`StderrReporter`] prints it
pub fn render(event: &DeadlockEvent) -> String {
    let mut out = String::new();
    match event.kind {
        EventKind::DeadlockDetected => {
            out.push_str(&format!(
                "[{}] Deadlock found between {} thread(s)\n",
                event.timestamp,
                event.threads.len()
            ));
            for stack in &event.stacks {
                let waiting = event
                    .thread_waiting_for_locks
                    .iter()
                    .find(|(t, _)| *t == stack.thread_id)
                    .map(|(_, l)| format!(" waiting for lock {l}"))
                    .unwrap_or_default();
                match &stack.name {
                    Some(name) => out.push_str(&format!(
                        "  thread {} \"{}\"{}\n",
                        stack.thread_id, name, waiting
                    )),
                    None => out.push_str(&format!("  thread {}{}\n", stack.thread_id, waiting)),
                }
                for frame in &stack.frames {
                    out.push_str(&format!("      at {frame}\n"));
                }
            }
        }
        EventKind::ObservationFailed => {
            out.push_str(&format!(
                "[{}] Thread state could not be sampled: {}\n",
                event.timestamp,
                event.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out
}

/// Appends one JSON object per event to a file
pub struct JsonLinesReporter {
    file: File,
    path: PathBuf,
}

impl JsonLinesReporter {
    /// Open (or create) the output file
    ///
    /// The path may contain "{timestamp}", replaced with the current time.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_log_path(path)?;
        let file = open_append(&path)?;
        Ok(JsonLinesReporter { file, path })
    }

    /// Path of the output file after placeholder expansion
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Reporter for JsonLinesReporter {
    fn report(&self, event: &DeadlockEvent) {
        let mut file = &self.file;
        if let Ok(json) = serde_json::to_string(event)
            && let Err(e) = writeln!(file, "{json}").and_then(|_| file.flush())
        {
            eprintln!("Failed to write deadlock report: {e:?}");
        }
    }
}
