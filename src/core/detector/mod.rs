//! Cycle detection over the wait-for graph
//!
//! Every strongly connected component (SCC) with two or more threads, and
//! every thread waiting on itself, is a deadlock. A full SCC decomposition
//! finds all simultaneous deadlocks in one linear pass and does not depend on
//! where the search starts.

pub mod deadlock_handling;

use crate::core::graph::WaitForGraph;
use crate::core::types::{DeadlockGroup, ThreadId};
use fxhash::{FxHashMap, FxHashSet};

/// Find every deadlock group in `graph`
///
/// Groups are returned sorted and without duplicates. Threads that merely
/// wait on a deadlocked thread, without being part of the cycle, are not
/// included.
pub fn detect(graph: &WaitForGraph) -> Vec<DeadlockGroup> {
    let mut tarjan = Tarjan::new(graph);
    for node in graph.nodes() {
        if !tarjan.index.contains_key(&node) {
            tarjan.visit(node);
        }
    }

    let mut groups = tarjan.groups;
    groups.sort();
    groups.dedup();
    groups
}

/// One pending step of the depth-first search
struct Frame {
    node: ThreadId,
    /// Successor not yet explored
    pending: Option<ThreadId>,
}

/// Iterative Tarjan SCC state
///
/// Uses an explicit frame stack instead of recursion so long wait chains
/// cannot overflow the monitor thread's stack.
struct Tarjan<'g> {
    graph: &'g WaitForGraph,
    next_index: usize,
    index: FxHashMap<ThreadId, usize>,
    lowlink: FxHashMap<ThreadId, usize>,
    stack: Vec<ThreadId>,
    on_stack: FxHashSet<ThreadId>,
    groups: Vec<DeadlockGroup>,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g WaitForGraph) -> Self {
        Tarjan {
            graph,
            next_index: 0,
            index: FxHashMap::default(),
            lowlink: FxHashMap::default(),
            stack: Vec::new(),
            on_stack: FxHashSet::default(),
            groups: Vec::new(),
        }
    }

    fn enter(&mut self, node: ThreadId) -> Frame {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);
        Frame {
            node,
            pending: self.graph.successor(node),
        }
    }

    fn lower(&mut self, node: ThreadId, candidate: usize) {
        if let Some(low) = self.lowlink.get_mut(&node)
            && candidate < *low
        {
            *low = candidate;
        }
    }

    fn visit(&mut self, root: ThreadId) {
        let mut frames = vec![self.enter(root)];

        while let Some(frame) = frames.last_mut() {
            let node = frame.node;

            if let Some(next) = frame.pending.take() {
                match self.index.get(&next) {
                    None => {
                        let child = self.enter(next);
                        frames.push(child);
                    }
                    Some(&next_index) if self.on_stack.contains(&next) => {
                        self.lower(node, next_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            // All successors explored
            frames.pop();
            let low = self.lowlink[&node];
            if low == self.index[&node] {
                self.pop_component(node);
            }
            if let Some(parent) = frames.last() {
                let parent = parent.node;
                self.lower(parent, low);
            }
        }
    }

    fn pop_component(&mut self, root: ThreadId) {
        let mut members = Vec::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack.remove(&member);
            members.push(member);
            if member == root {
                break;
            }
        }

        let self_loop = members.len() == 1 && self.graph.successor(root) == Some(root);
        if members.len() >= 2 || self_loop {
            self.groups.push(DeadlockGroup::new(members));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Snapshot, ThreadRecord};

    fn graph_of(threads: Vec<ThreadRecord>) -> WaitForGraph {
        WaitForGraph::build(&Snapshot::new(threads))
    }

    /// Threads `ids[i]` hold lock `100 + i` and wait on the next one in the ring
    fn ring(ids: &[ThreadId]) -> Vec<ThreadRecord> {
        let n = ids.len();
        ids.iter()
            .enumerate()
            .map(|(i, &id)| {
                ThreadRecord::new(id)
                    .holding(100 + i)
                    .waiting_on(100 + (i + 1) % n)
            })
            .collect()
    }

    #[test]
    fn test_disjoint_waits_have_no_cycle() {
        let graph = graph_of(vec![
            ThreadRecord::new(1).holding(10),
            ThreadRecord::new(2).holding(11).waiting_on(10),
            ThreadRecord::new(3).waiting_on(11),
            ThreadRecord::new(4).waiting_on(10),
        ]);
        assert_eq!(graph.edge_count(), 3);
        assert!(detect(&graph).is_empty());
    }

    #[test]
    fn test_two_thread_mutual_wait() {
        let graph = graph_of(vec![
            ThreadRecord::new(1).holding(10).waiting_on(11),
            ThreadRecord::new(2).holding(11).waiting_on(10),
        ]);
        assert_eq!(detect(&graph), vec![DeadlockGroup::new([1, 2])]);
    }

    #[test]
    fn test_self_wait() {
        let graph = graph_of(vec![
            ThreadRecord::new(1).holding(10).waiting_on(10),
            ThreadRecord::new(2).waiting_on(10),
        ]);
        assert_eq!(detect(&graph), vec![DeadlockGroup::new([1])]);
    }

    #[test]
    fn test_ring_excludes_feeders() {
        let mut threads = ring(&[11, 12, 13, 14, 15]);
        // Thread 10 waits on thread 11's lock; nothing waits on thread 10
        threads.push(ThreadRecord::new(10).waiting_on(100));
        let graph = graph_of(threads);

        let groups = detect(&graph);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].threads(), &[11, 12, 13, 14, 15]);
        assert!(!groups[0].contains(10));
    }

    #[test]
    fn test_dangling_wait_is_ignored() {
        let graph = graph_of(vec![
            ThreadRecord::new(1).holding(10).waiting_on(11),
            ThreadRecord::new(2).holding(11).waiting_on(10),
            ThreadRecord::new(3).waiting_on(42),
        ]);
        assert_eq!(graph.dropped_waits(), 1);
        assert_eq!(detect(&graph), vec![DeadlockGroup::new([1, 2])]);
    }

    #[test]
    fn test_simultaneous_deadlocks() {
        let mut threads = vec![
            ThreadRecord::new(1).holding(1).waiting_on(2),
            ThreadRecord::new(2).holding(2).waiting_on(1),
            ThreadRecord::new(9).holding(9).waiting_on(9),
        ];
        threads.extend(ring(&[20, 21, 22]));

        let groups = detect(&graph_of(threads));
        assert_eq!(
            groups,
            vec![
                DeadlockGroup::new([1, 2]),
                DeadlockGroup::new([9]),
                DeadlockGroup::new([20, 21, 22]),
            ]
        );
    }

    #[test]
    fn test_result_independent_of_record_order() {
        let mut threads = ring(&[3, 1, 4, 5, 9, 2, 6]);
        let forward = detect(&graph_of(threads.clone()));
        threads.reverse();
        let backward = detect(&graph_of(threads));

        assert_eq!(forward, backward);
        assert_eq!(forward[0].threads(), &[1, 2, 3, 4, 5, 6, 9]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        // 50k threads in a line, closed into one big cycle at the end
        let ids: Vec<ThreadId> = (1..=50_000).collect();
        let groups = detect(&graph_of(ring(&ids)));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 50_000);
    }

    #[test]
    fn test_empty_graph() {
        assert!(detect(&WaitForGraph::new()).is_empty());
    }
}
