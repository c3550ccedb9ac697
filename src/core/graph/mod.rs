//! Graph module for deadlock detection
//!
//! The wait-for graph records which threads are waiting for which other
//! threads in one snapshot. It is rebuilt from scratch for every sample.

pub(crate) mod wait_for_graph;

pub use wait_for_graph::{WaitEdge, WaitForGraph};
