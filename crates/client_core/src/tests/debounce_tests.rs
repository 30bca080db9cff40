use super::*;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

fn counter_action(counter: &Arc<AtomicUsize>, value: usize) -> impl FnOnce() + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.store(value, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn only_the_last_call_in_a_burst_runs() {
    let debouncer = Debouncer::new(Duration::from_millis(300));
    let last = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    for value in 1..=3 {
        let runs = Arc::clone(&runs);
        let store = counter_action(&last, value);
        debouncer.call(move || {
            runs.fetch_add(1, Ordering::SeqCst);
            store();
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(last.load(Ordering::SeqCst), 3);
    assert!(!debouncer.is_pending());
}

#[tokio::test(start_paused = true)]
async fn cancel_drops_the_pending_action() {
    let debouncer = Debouncer::new(Duration::from_millis(300));
    let last = Arc::new(AtomicUsize::new(0));

    debouncer.call(counter_action(&last, 9));
    assert!(debouncer.is_pending());
    debouncer.cancel();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(last.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_debouncer_cancels() {
    let last = Arc::new(AtomicUsize::new(0));
    {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        debouncer.call(counter_action(&last, 1));
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(last.load(Ordering::SeqCst), 0);
}
