//! In-process lock registry
//!
//! [`TrackedMutex`](crate::TrackedMutex) reports every wait, acquisition and
//! release here. The registry answers the question a snapshot source asks:
//! which lock is each thread blocked on, and which locks does it hold.
//!
//! Call sites stand in for stack frames: each thread's "stack" is the
//! location of the pending lock call followed by the locations where its
//! held locks were acquired, innermost first.

use crate::core::types::{LockId, Snapshot, ThreadId, ThreadRecord};
use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::panic::Location;

type CallSite = &'static Location<'static>;

#[derive(Debug)]
struct ThreadEntry {
    name: Option<String>,
    /// Held locks in acquisition order
    held: Vec<(LockId, CallSite)>,
    waiting: Option<(LockId, CallSite)>,
}

impl ThreadEntry {
    fn current() -> Self {
        ThreadEntry {
            name: std::thread::current().name().map(String::from),
            held: Vec::new(),
            waiting: None,
        }
    }

    fn is_idle(&self) -> bool {
        self.held.is_empty() && self.waiting.is_none()
    }

    fn record(&self, thread_id: ThreadId) -> ThreadRecord {
        let mut stack = Vec::with_capacity(self.held.len() + 1);
        if let Some((lock_id, site)) = self.waiting {
            stack.push(format!("waiting for lock {lock_id} at {site}"));
        }
        for (lock_id, site) in self.held.iter().rev() {
            stack.push(format!("holding lock {lock_id} acquired at {site}"));
        }

        ThreadRecord {
            id: thread_id,
            name: self.name.clone(),
            stack,
            held: self.held.iter().map(|&(lock_id, _)| lock_id).collect(),
            waiting_for: self.waiting.map(|(lock_id, _)| lock_id),
        }
    }
}

/// Wait and ownership state of every thread using tracked locks
#[derive(Debug, Default)]
pub struct LockRegistry {
    threads: Mutex<FxHashMap<ThreadId, ThreadEntry>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `thread_id` is about to block on `lock_id`
    pub fn on_lock_attempt(&self, thread_id: ThreadId, lock_id: LockId, site: CallSite) {
        let mut threads = self.threads.lock();
        let entry = threads.entry(thread_id).or_insert_with(ThreadEntry::current);
        entry.waiting = Some((lock_id, site));
    }

    /// Record that `thread_id` now holds `lock_id`
    pub fn on_lock_acquired(&self, thread_id: ThreadId, lock_id: LockId, site: CallSite) {
        let mut threads = self.threads.lock();
        let entry = threads.entry(thread_id).or_insert_with(ThreadEntry::current);
        if entry.waiting.is_some_and(|(waiting, _)| waiting == lock_id) {
            entry.waiting = None;
        }
        entry.held.push((lock_id, site));
    }

    /// Record that `thread_id` released `lock_id`
    pub fn on_lock_release(&self, thread_id: ThreadId, lock_id: LockId) {
        let mut threads = self.threads.lock();
        let Some(entry) = threads.get_mut(&thread_id) else {
            return;
        };
        if let Some(pos) = entry.held.iter().rposition(|&(held, _)| held == lock_id) {
            entry.held.remove(pos);
        }
        if entry.is_idle() {
            threads.remove(&thread_id);
        }
    }

    /// Copy the current state into a snapshot, threads in ascending id order
    pub fn capture(&self) -> Snapshot {
        let threads = self.threads.lock();
        let mut records: Vec<ThreadRecord> = threads
            .iter()
            .map(|(&thread_id, entry)| entry.record(thread_id))
            .collect();
        drop(threads);

        records.sort_by_key(|record| record.id);
        Snapshot::new(records)
    }

    /// Number of threads currently holding or waiting for a tracked lock
    pub fn len(&self) -> usize {
        self.threads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.lock().is_empty()
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: LockRegistry = LockRegistry::new();
}

/// The process-wide registry fed by tracked locks
pub fn global_registry() -> &'static LockRegistry {
    &GLOBAL_REGISTRY
}
