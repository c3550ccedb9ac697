//! Deadlock monitor
//!
//! The monitor drives the pipeline once per sample:
//!
//! ```text
//! SnapshotSource::capture -> WaitForGraph::build -> detect -> Reporter::report
//! ```
//!
//! Reporting is edge-triggered. The monitor remembers the groups found in
//! the previous sample and only reports groups that were not there. A group
//! whose membership grows or shrinks is a different group and is reported
//! again; a group that disappears and comes back is reported again.
//!
//! Collaborators are isolated. A failing or panicking source, or a panicking
//! reporter, costs that one sample and nothing more. Graph building and
//! detection are not guarded.

mod handle;

pub use handle::MonitorHandle;

use crate::core::config::MonitorConfig;
use crate::core::detector::{deadlock_handling::extract_deadlock_event, detect};
use crate::core::error::ObservationError;
use crate::core::graph::WaitForGraph;
use crate::core::logger::{self, SampleStats};
use crate::core::reporter::Reporter;
use crate::core::source::SnapshotSource;
use crate::core::types::{DeadlockEvent, DeadlockGroup};
use fxhash::FxHashSet;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Where the monitor is in its sampling cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorState {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// Capturing and analysing a snapshot
    Sampling,
    /// The last sample found no deadlock
    NoDeadlock,
    /// The last sample found at least one deadlock
    DeadlockPresent,
}

/// Result of one sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    /// A snapshot was analysed
    Observed {
        /// Every group present in this sample
        groups: Vec<DeadlockGroup>,
        /// Groups reported by this sample
        new_groups: Vec<DeadlockGroup>,
    },
    /// No snapshot could be captured; the sample was skipped
    ObservationFailed(String),
}

/// Periodic wait-for graph sampler with edge-triggered reporting
///
/// The monitor owns its collaborators and its report state, so several
/// monitors (one per subsystem, say) never interfere with each other.
pub struct DeadlockMonitor<S, R> {
    config: MonitorConfig,
    source: S,
    reporter: R,
    /// Groups present in the previous successful sample
    last_reported: FxHashSet<DeadlockGroup>,
    state: MonitorState,
}

impl<S: SnapshotSource, R: Reporter> DeadlockMonitor<S, R> {
    pub fn new(config: MonitorConfig, source: S, reporter: R) -> Self {
        DeadlockMonitor {
            config,
            source,
            reporter,
            last_reported: FxHashSet::default(),
            state: MonitorState::Idle,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Groups remembered from the previous sample, sorted
    pub fn last_reported(&self) -> Vec<DeadlockGroup> {
        let mut groups: Vec<_> = self.last_reported.iter().cloned().collect();
        groups.sort();
        groups
    }

    /// Take the collaborators back
    pub fn into_parts(self) -> (S, R) {
        (self.source, self.reporter)
    }

    /// Run one sample: capture, build, detect, report new groups
    pub fn sample_once(&mut self) -> SampleOutcome {
        self.state = MonitorState::Sampling;

        let source = &mut self.source;
        let snapshot = match panic::catch_unwind(AssertUnwindSafe(|| source.capture())) {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => return self.observation_failed(e),
            Err(payload) => {
                return self.observation_failed(ObservationError::Panicked(panic_message(
                    payload.as_ref(),
                )));
            }
        };

        let graph = WaitForGraph::build(&snapshot);
        let groups = detect(&graph);

        let new_groups: Vec<DeadlockGroup> = groups
            .iter()
            .filter(|group| !self.last_reported.contains(*group))
            .cloned()
            .collect();

        for group in &new_groups {
            let event = extract_deadlock_event(
                group,
                &snapshot,
                &graph,
                self.config.stack_depth_limit(),
            );
            logger::log_deadlock(group);
            self.dispatch(&event);
        }

        self.last_reported = groups.iter().cloned().collect();

        logger::log_sample(SampleStats {
            threads: snapshot.threads.len(),
            edges: graph.edge_count(),
            dropped_waits: graph.dropped_waits(),
            groups: groups.len(),
            new_groups: new_groups.len(),
        });

        self.state = if groups.is_empty() {
            MonitorState::NoDeadlock
        } else {
            MonitorState::DeadlockPresent
        };

        SampleOutcome::Observed { groups, new_groups }
    }

    /// Record a failed capture; the report state is kept as it was
    fn observation_failed(&mut self, error: ObservationError) -> SampleOutcome {
        let message = error.to_string();
        logger::log_observation_failure(&message);
        if self.config.report_observation_failures() {
            self.dispatch(&DeadlockEvent::observation_failed(&message));
        }
        self.state = MonitorState::Idle;
        SampleOutcome::ObservationFailed(message)
    }

    /// Hand an event to the reporter; a panicking sink does not stop the monitor
    fn dispatch(&self, event: &DeadlockEvent) {
        let reporter = &self.reporter;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| reporter.report(event))) {
            eprintln!(
                "Deadlock reporter panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
