use deadwatch::{Deadwatch, DeadlockEvent, EventKind, MonitorConfig, MonitorHandle, RegistrySource};
use std::sync::mpsc;
use std::time::Duration;

#[allow(dead_code)]
pub const DEADLOCK_TIMEOUT: Duration = Duration::from_secs(3);
#[allow(dead_code)]
pub const NO_DEADLOCK_TIMEOUT: Duration = Duration::from_millis(600);

pub struct MonitorHarness {
    pub rx: mpsc::Receiver<DeadlockEvent>,
    pub handle: MonitorHandle<RegistrySource, deadwatch::BoxedReporter>,
}

pub fn start_monitor() -> MonitorHarness {
    let (tx, rx) = mpsc::channel::<DeadlockEvent>();

    let config = MonitorConfig::new()
        .with_sample_interval_millis(100)
        .expect("100 ms is a valid interval");

    let handle = Deadwatch::new()
        .config(config)
        .callback(move |event| {
            let _ = tx.send(event.clone());
        })
        .start()
        .expect("Failed to start monitor");

    MonitorHarness { rx, handle }
}

#[allow(dead_code)]
pub fn expect_deadlock(h: &MonitorHarness, timeout: Duration) -> DeadlockEvent {
    match h.rx.recv_timeout(timeout) {
        Ok(event) => {
            assert_eq!(event.kind, EventKind::DeadlockDetected);
            event
        }
        Err(_) => panic!("No deadlock detected within {timeout:?}"),
    }
}

#[allow(dead_code)]
pub fn assert_no_deadlock(h: &MonitorHarness, timeout: Duration) {
    if let Ok(event) = h.rx.recv_timeout(timeout) {
        panic!("Unexpected deadlock detected: {:?}", event.threads);
    }
}
