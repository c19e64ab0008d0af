// tests/scheduler_ticks.rs
mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cinema_sync::scheduler::{spawn_scheduler, SchedulerCfg};
use cinema_sync::TickOutcome;
use common::*;

fn harness() -> Harness {
    Harness::new(
        vec![record("page-1", "tt0111161", at(5, 20))],
        vec![("tt0111161", movie("The Shawshank Redemption", 142, None))],
    )
}

#[tokio::test(start_paused = true)]
async fn overlapping_tick_is_skipped() {
    let h = harness();
    *h.source.delay.lock() = Some(Duration::from_secs(30));

    let (a, b) = tokio::join!(h.engine.run_tick_at(now()), async {
        tokio::task::yield_now().await;
        h.engine.run_tick_at(now()).await
    });
    assert!(matches!(a.unwrap(), TickOutcome::Completed(_)));
    assert_eq!(b.unwrap(), TickOutcome::Skipped);
    assert_eq!(h.source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.publisher.total(), 1);
}

#[tokio::test(start_paused = true)]
async fn runs_immediately_then_every_interval() {
    let h = harness();
    let source = h.source.clone();
    let publisher = h.publisher.clone();
    let engine = Arc::new(h.engine);

    let sched = spawn_scheduler(engine, SchedulerCfg::from_secs(300));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    assert_eq!(publisher.creates(), 1);

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    // Second tick saw no change.
    assert_eq!(publisher.total(), 1);

    sched.shutdown().await;
    tokio::time::sleep(Duration::from_secs(900)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_tick_never_overlaps_the_next() {
    let h = harness();
    *h.source.delay.lock() = Some(Duration::from_secs(400));
    let source = h.source.clone();
    let sched = spawn_scheduler(Arc::new(h.engine), SchedulerCfg::from_secs(300));

    // Tick 1 runs 0..400; the missed 300s tick fires once it ends.
    tokio::time::sleep(Duration::from_secs(350)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    // Tick 2 runs 400..800; the 600s tick waits for it.
    tokio::time::sleep(Duration::from_secs(440)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 3);

    drop(sched);
}

#[tokio::test(start_paused = true)]
async fn failing_source_does_not_stop_the_loop() {
    let h = harness();
    h.source.fail.store(true, Ordering::SeqCst);
    let source = h.source.clone();
    let publisher = h.publisher.clone();
    let sched = spawn_scheduler(Arc::new(h.engine), SchedulerCfg::from_secs(60));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    source.fail.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    assert_eq!(publisher.creates(), 1);

    sched.shutdown().await;
}
