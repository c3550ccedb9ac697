use deadwatch::TrackedMutex;
use std::sync::{Arc, Barrier, mpsc};
use std::thread;
use std::time::Duration;
mod common;
use common::{DEADLOCK_TIMEOUT, expect_deadlock, start_monitor};

#[test]
fn test_partial_deadlock_excludes_blocked_bystanders() {
    let harness = start_monitor();

    let mutex_a = Arc::new(TrackedMutex::new(()));
    let mutex_b = Arc::new(TrackedMutex::new(()));
    let barrier = Arc::new(Barrier::new(2));

    let (a, b, gate) = (Arc::clone(&mutex_a), Arc::clone(&mutex_b), Arc::clone(&barrier));
    thread::spawn(move || {
        let _ga = a.lock();
        gate.wait();
        let _gb = b.lock();
    });
    let (a, b, gate) = (Arc::clone(&mutex_a), Arc::clone(&mutex_b), Arc::clone(&barrier));
    thread::spawn(move || {
        let _gb = b.lock();
        gate.wait();
        let _ga = a.lock();
    });

    // Bystander: blocks on A forever but is not part of the cycle
    let (id_tx, id_rx) = mpsc::channel();
    let a = Arc::clone(&mutex_a);
    thread::spawn(move || {
        id_tx.send(deadwatch::get_current_thread_id()).unwrap();
        thread::sleep(Duration::from_millis(50));
        let _ga = a.lock();
    });
    let bystander = id_rx.recv().unwrap();

    // Workers that use their own locks and finish normally
    let workers: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let local = TrackedMutex::new(i);
                for _ in 0..100 {
                    *local.lock() += 1;
                }
                local.into_inner()
            })
        })
        .collect();
    for worker in workers {
        assert!(worker.join().unwrap() >= 100);
    }

    let event = expect_deadlock(&harness, DEADLOCK_TIMEOUT);
    assert_eq!(event.threads.len(), 2);
    assert!(!event.threads.contains(&bystander));
}
