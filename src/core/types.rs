use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Opaque and stable within one snapshot.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Lock identifier type
///
/// Identifies one synchronization object for the lifetime of a snapshot.
/// Identities may be reused over the life of a process, never within a
/// single snapshot.
pub type LockId = usize;

/// State of one thread at the moment it was sampled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRecord {
    /// Thread identifier
    pub id: ThreadId,
    /// Human readable thread name, if the host knows one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Execution stack, innermost frame first
    #[serde(default)]
    pub stack: Vec<String>,
    /// Locks currently held by this thread
    #[serde(default)]
    pub held: Vec<LockId>,
    /// Lock this thread is blocked waiting to acquire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_for: Option<LockId>,
}

impl ThreadRecord {
    /// Create a record for a thread that holds nothing and waits for nothing
    pub fn new(id: ThreadId) -> Self {
        ThreadRecord {
            id,
            name: None,
            stack: Vec::new(),
            held: Vec::new(),
            waiting_for: None,
        }
    }

    /// Set the thread name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a lock to the held set
    pub fn holding(mut self, lock_id: LockId) -> Self {
        self.held.push(lock_id);
        self
    }

    /// Mark the thread as blocked on `lock_id`
    pub fn waiting_on(mut self, lock_id: LockId) -> Self {
        self.waiting_for = Some(lock_id);
        self
    }

    /// Replace the stack frames
    pub fn with_stack<I, F>(mut self, frames: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        self.stack = frames.into_iter().map(Into::into).collect();
        self
    }
}

/// Thread records captured at a single instant
///
/// A snapshot is not guaranteed to be internally consistent: threads may
/// change state between the source's per-thread reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
    /// One record per live thread
    #[serde(default)]
    pub threads: Vec<ThreadRecord>,
}

impl Snapshot {
    /// Create a snapshot stamped with the current time
    pub fn new(threads: Vec<ThreadRecord>) -> Self {
        Snapshot {
            captured_at: Utc::now(),
            threads,
        }
    }

    /// Look up the first record for `thread_id`
    pub fn thread(&self, thread_id: ThreadId) -> Option<&ThreadRecord> {
        self.threads.iter().find(|t| t.id == thread_id)
    }
}

/// A set of threads that are deadlocked on each other
///
/// Members are kept sorted and unique, so the group doubles as its own
/// signature for edge-triggered reporting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeadlockGroup {
    threads: Vec<ThreadId>,
}

impl DeadlockGroup {
    /// Build a group from any collection of thread ids
    pub fn new(threads: impl IntoIterator<Item = ThreadId>) -> Self {
        let mut threads: Vec<ThreadId> = threads.into_iter().collect();
        threads.sort_unstable();
        threads.dedup();
        DeadlockGroup { threads }
    }

    /// Sorted member ids
    pub fn threads(&self) -> &[ThreadId] {
        &self.threads
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn contains(&self, thread_id: ThreadId) -> bool {
        self.threads.binary_search(&thread_id).is_ok()
    }
}

/// Kind of event delivered to a reporter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A new deadlock group appeared
    DeadlockDetected,
    /// The snapshot source failed for one sample
    ObservationFailed,
}

/// Truncated stack of one thread in a reported group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadStack {
    pub thread_id: ThreadId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub frames: Vec<String>,
}

/// Event delivered to a [`Reporter`](crate::Reporter)
///
/// A `DeadlockDetected` event carries exactly one deadlock group together
/// with the depth-bounded stacks of its members. An `ObservationFailed` event
/// carries no threads, only the failure text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockEvent {
    /// What happened
    pub kind: EventKind,

    /// RFC 3339 timestamp of the detection
    pub timestamp: String,

    /// Sorted member threads of the group
    pub threads: Vec<ThreadId>,

    /// Per-thread stacks, in the same order as `threads`
    pub stacks: Vec<ThreadStack>,

    /// Which lock each member is blocked on. Each tuple is (thread_id, lock_id).
    pub thread_waiting_for_locks: Vec<(ThreadId, LockId)>,

    /// Failure description for `ObservationFailed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeadlockEvent {
    /// Event for a snapshot that could not be captured
    pub fn observation_failed(error: impl ToString) -> Self {
        DeadlockEvent {
            kind: EventKind::ObservationFailed,
            timestamp: Utc::now().to_rfc3339(),
            threads: Vec::new(),
            stacks: Vec::new(),
            thread_waiting_for_locks: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}
