use crate::core::graph::WaitForGraph;
use crate::core::types::{DeadlockEvent, DeadlockGroup, EventKind, Snapshot, ThreadStack};

/// Turn a detected group into the event handed to the reporter
///
/// Stacks are cut to `stack_depth_limit` frames here and nowhere else; the
/// limit never influences which groups are found.
///
/// # Arguments
/// * `group` - The detected deadlock group
/// * `snapshot` - The snapshot the group was found in
/// * `graph` - The wait-for graph built from `snapshot`
/// * `stack_depth_limit` - Maximum frames reported per thread
pub fn extract_deadlock_event(
    group: &DeadlockGroup,
    snapshot: &Snapshot,
    graph: &WaitForGraph,
    stack_depth_limit: usize,
) -> DeadlockEvent {
    let stacks = group
        .threads()
        .iter()
        .map(|&thread_id| {
            let record = snapshot.thread(thread_id);
            ThreadStack {
                thread_id,
                name: record.and_then(|r| r.name.clone()),
                frames: record
                    .map(|r| r.stack.iter().take(stack_depth_limit).cloned().collect())
                    .unwrap_or_default(),
            }
        })
        .collect();

    // Only include wait-for edges for threads in the group
    let thread_waiting_for_locks = group
        .threads()
        .iter()
        .filter_map(|&t| graph.edge(t).map(|edge| (t, edge.lock_id)))
        .collect();

    DeadlockEvent {
        kind: EventKind::DeadlockDetected,
        timestamp: snapshot.captured_at.to_rfc3339(),
        threads: group.threads().to_vec(),
        stacks,
        thread_waiting_for_locks,
        error: None,
    }
}
