//! Wait-For Graph built from a single snapshot
//!
//! This module turns one [`Snapshot`] into a directed wait-for graph (WFG).
//! Nodes are thread ids; an edge `T -> U` means thread T is blocked waiting
//! for a lock that thread U holds.
//!
//! # How it works
//!
//! Building happens in two passes over the snapshot:
//! 1. *Holder index*: maps every held `LockId` to the thread holding it.
//! 2. *Wait edges*: every thread with `waiting_for = Some(L)` gets an edge to
//!    the indexed holder of L.
//!
//! A snapshot is a sequence of per-thread reads, so it can be torn. A wait on
//! a lock nobody holds (released between reads, or held by a thread that was
//! not captured) and a wait on a lock claimed by two threads are both dropped
//! without an edge. They are counted, never treated as errors.
//!
//! Locks that are held but not waited on never become nodes.

use crate::core::types::{LockId, Snapshot, ThreadId};
use fxhash::{FxHashMap, FxHashSet};

/// Outgoing edge of a blocked thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitEdge {
    /// Thread holding the lock
    pub holder: ThreadId,
    /// Lock the waiting thread is blocked on
    pub lock_id: LockId,
}

/// Who holds a lock according to the snapshot
#[derive(Debug, Clone, Copy)]
enum Holder {
    Unique(ThreadId),
    /// More than one thread claimed the lock; the snapshot is torn here
    Ambiguous,
}

/// Represents a directed graph of thread wait relationships
///
/// A thread waits for at most one lock, so each node has at most one
/// outgoing edge.
#[derive(Debug, Default, Clone)]
pub struct WaitForGraph {
    /// Maps a waiting thread to the thread it is waiting for
    pub(crate) edges: FxHashMap<ThreadId, WaitEdge>,

    /// Waits that could not be resolved to a single holder
    dropped_waits: usize,
}

impl WaitForGraph {
    /// Create a new empty wait-for graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the wait-for graph of one snapshot
    ///
    /// Runs in O(threads x locks held per thread). Never fails: unresolved
    /// waits are dropped and counted in [`dropped_waits`](Self::dropped_waits).
    pub fn build(snapshot: &Snapshot) -> Self {
        let mut seen: FxHashSet<ThreadId> = FxHashSet::default();
        let mut holders: FxHashMap<LockId, Holder> = FxHashMap::default();

        // Duplicate records for one thread are ignored, first one wins
        let records: Vec<_> = snapshot
            .threads
            .iter()
            .filter(|record| seen.insert(record.id))
            .collect();

        for record in &records {
            for &lock_id in &record.held {
                holders
                    .entry(lock_id)
                    .and_modify(|holder| {
                        if let Holder::Unique(owner) = *holder
                            && owner != record.id
                        {
                            *holder = Holder::Ambiguous;
                        }
                    })
                    .or_insert(Holder::Unique(record.id));
            }
        }

        let mut graph = WaitForGraph::new();
        for record in &records {
            let Some(lock_id) = record.waiting_for else {
                continue;
            };
            match holders.get(&lock_id) {
                Some(Holder::Unique(holder)) => graph.add_edge(record.id, *holder, lock_id),
                Some(Holder::Ambiguous) | None => graph.dropped_waits += 1,
            }
        }
        graph
    }

    /// Add a directed edge: `from` thread waits on `lock_id` held by `to`
    ///
    /// A thread has a single outgoing edge; adding another replaces it.
    pub fn add_edge(&mut self, from: ThreadId, to: ThreadId, lock_id: LockId) {
        self.edges.insert(
            from,
            WaitEdge {
                holder: to,
                lock_id,
            },
        );
    }

    /// The edge leaving `thread_id`, if it is waiting on a resolved holder
    pub fn edge(&self, thread_id: ThreadId) -> Option<WaitEdge> {
        self.edges.get(&thread_id).copied()
    }

    /// The thread `thread_id` is waiting for
    pub fn successor(&self, thread_id: ThreadId) -> Option<ThreadId> {
        self.edges.get(&thread_id).map(|edge| edge.holder)
    }

    /// All nodes touched by an edge, sorted ascending
    pub fn nodes(&self) -> Vec<ThreadId> {
        let mut nodes: Vec<ThreadId> = self
            .edges
            .iter()
            .flat_map(|(&from, edge)| [from, edge.holder])
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Number of waits dropped because no single holder was found
    pub fn dropped_waits(&self) -> usize {
        self.dropped_waits
    }
}
