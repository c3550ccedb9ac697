use crate::core::error::MonitorError;
use crate::core::logger;
use crate::core::monitor::{DeadlockMonitor, MonitorState};
use crate::core::reporter::Reporter;
use crate::core::source::SnapshotSource;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::thread::JoinHandle;
use std::time::Instant;

/// Control messages for the sampling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    /// Sample now, outside the schedule
    Wake,
    /// Leave the loop
    Shutdown,
}

/// Handle to a monitor running on its background thread
///
/// Dropping the handle shuts the monitor down and waits for the loop to
/// finish its current sample.
pub struct MonitorHandle<S, R> {
    sender: Sender<Signal>,
    thread: Option<JoinHandle<DeadlockMonitor<S, R>>>,
}

impl<S, R> DeadlockMonitor<S, R>
where
    S: SnapshotSource + 'static,
    R: Reporter + 'static,
{
    /// Move the monitor onto a dedicated background thread
    ///
    /// The first sample is taken one interval after start.
    ///
    /// # Errors
    /// Returns [`MonitorError::Spawn`] if the thread cannot be created
    pub fn spawn(self) -> Result<MonitorHandle<S, R>, MonitorError> {
        let (sender, receiver) = unbounded::<Signal>();
        let thread = std::thread::Builder::new()
            .name("deadwatch-monitor".into())
            .spawn(move || self.run(receiver))
            .map_err(MonitorError::Spawn)?;

        Ok(MonitorHandle {
            sender,
            thread: Some(thread),
        })
    }

    /// The sampling loop
    ///
    /// Blocks on the control channel until the next tick. A wake samples
    /// immediately and leaves the schedule untouched; a shutdown, or every
    /// handle going away, ends the loop between samples.
    fn run(mut self, signals: Receiver<Signal>) -> Self {
        let interval = self.config.sample_interval();
        logger::log_monitor_started(interval);

        let mut next_tick = Instant::now() + interval;
        loop {
            match signals.recv_deadline(next_tick) {
                Ok(Signal::Wake) => {
                    logger::log_wake();
                    self.sample_once();
                }
                Ok(Signal::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    self.sample_once();
                    next_tick += interval;
                    // Fell behind (slow source): re-anchor rather than burst
                    let now = Instant::now();
                    if next_tick <= now {
                        next_tick = now + interval;
                    }
                }
            }
            self.state = MonitorState::Idle;
        }

        logger::log_monitor_stopped();
        self
    }
}

impl<S, R> MonitorHandle<S, R> {
    /// Request an immediate out-of-schedule sample
    ///
    /// Returns false if the monitor is no longer running.
    pub fn wake(&self) -> bool {
        self.sender.send(Signal::Wake).is_ok()
    }

    /// Whether the monitor thread is still running
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stop the loop and take the monitor back
    ///
    /// The loop notices the request at its wait point, so a sample in
    /// progress always completes first.
    ///
    /// # Errors
    /// Returns [`MonitorError::Join`] if the monitor thread panicked
    pub fn shutdown(mut self) -> Result<DeadlockMonitor<S, R>, MonitorError> {
        let _ = self.sender.send(Signal::Shutdown);
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| MonitorError::Join),
            None => Err(MonitorError::Join),
        }
    }
}

impl<S, R> Drop for MonitorHandle<S, R> {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.sender.send(Signal::Shutdown);
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::MonitorConfig;
    use crate::core::error::ObservationError;
    use crate::core::monitor::DeadlockMonitor;
    use crate::core::types::{DeadlockEvent, EventKind, Snapshot, ThreadRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc};
    use std::time::{Duration, Instant};

    fn counting_source(
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> Result<Snapshot, ObservationError> + Send + 'static {
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Snapshot::new(vec![
                ThreadRecord::new(1).holding(10).waiting_on(20),
                ThreadRecord::new(2).holding(20).waiting_on(10),
            ]))
        }
    }

    fn config(millis: u64) -> MonitorConfig {
        MonitorConfig::new()
            .with_sample_interval_millis(millis)
            .unwrap()
    }

    #[test]
    fn test_periodic_sampling_reports_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel::<DeadlockEvent>();
        let reporter = move |event: &DeadlockEvent| {
            let _ = tx.send(event.clone());
        };

        let handle = DeadlockMonitor::new(config(100), counting_source(calls.clone()), reporter)
            .spawn()
            .unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.kind, EventKind::DeadlockDetected);
        assert_eq!(event.threads, vec![1, 2]);

        // Further samples see the same group and stay quiet
        std::thread::sleep(Duration::from_millis(350));
        assert!(rx.try_recv().is_err());

        let monitor = handle.shutdown().unwrap();
        assert!(calls.load(Ordering::SeqCst) >= 2);
        assert_eq!(monitor.last_reported().len(), 1);
    }

    #[test]
    fn test_wake_samples_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = DeadlockMonitor::new(
            config(60_000),
            counting_source(calls.clone()),
            |_: &DeadlockEvent| {},
        )
        .spawn()
        .unwrap();

        assert!(handle.wake());
        let deadline = Instant::now() + Duration::from_secs(2);
        while calls.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_running());

        handle.shutdown().unwrap();
    }

    #[test]
    fn test_wake_keeps_the_scheduled_tick() {
        let started = Instant::now();
        let (tx, rx) = mpsc::channel::<Duration>();
        let source = move || -> Result<Snapshot, ObservationError> {
            let _ = tx.send(started.elapsed());
            Ok(Snapshot::new(vec![]))
        };
        let handle = DeadlockMonitor::new(config(1000), source, |_: &DeadlockEvent| {})
            .spawn()
            .unwrap();

        std::thread::sleep(Duration::from_millis(300));
        assert!(handle.wake());
        std::thread::sleep(Duration::from_millis(950));
        handle.shutdown().unwrap();

        let samples: Vec<Duration> = rx.try_iter().collect();
        assert_eq!(samples.len(), 2, "samples at {samples:?}");
        assert!(samples[0] >= Duration::from_millis(300));
        assert!(samples[0] < Duration::from_millis(800));
        // The tick stays at 1000 ms instead of moving to 300 + 1000
        assert!(samples[1] >= Duration::from_millis(1000));
        assert!(samples[1] < Duration::from_millis(1250));
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle = DeadlockMonitor::new(
            config(60_000),
            counting_source(calls.clone()),
            |_: &DeadlockEvent| {},
        )
        .spawn()
        .unwrap();

        let started = Instant::now();
        handle.shutdown().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_stops_the_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        {
            let _handle =
                DeadlockMonitor::new(config(100), counting_source(calls.clone()), |_: &DeadlockEvent| {})
                    .spawn()
                    .unwrap();
        }
        let after_drop = calls.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }
}
