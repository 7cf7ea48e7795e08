//! Gate semantics: mutual exclusion, FIFO resumption, RAII release.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::gate::Gate;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn permit_excludes_concurrent_holders() {
    let gate = Gate::new();
    let inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let gate = gate.clone();
        let inside = inside.clone();
        handles.push(tokio::spawn(async move {
            let _permit = gate.acquire().await;
            let occupancy = inside.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(occupancy, 1, "two holders inside the gate at once");
            sleep(Duration::from_millis(2)).await;
            inside.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_resume_in_arrival_order() {
    let gate = Gate::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let blocker = gate.acquire().await;

    let mut handles = Vec::new();
    for id in 0..4u32 {
        let gate = gate.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move {
            let _permit = gate.acquire().await;
            order.lock().await.push(id);
        }));
        // Let the task enqueue on the gate before spawning the next one.
        sleep(Duration::from_millis(10)).await;
    }

    drop(blocker);
    for handle in handles {
        handle.await.expect("task panicked");
    }

    assert_eq!(*order.lock().await, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn permit_release_is_tied_to_drop() {
    let gate = Gate::new();
    assert!(!gate.is_held());

    let permit = gate.acquire().await;
    assert!(gate.is_held());

    drop(permit);
    assert!(!gate.is_held());

    // Re-acquisition after release must not deadlock.
    let _again = gate.acquire().await;
    assert!(gate.is_held());
}
