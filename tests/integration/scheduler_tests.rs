//! End-to-end scheduling behavior, mostly on paused time

use crate::{EchoFetcher, Recorder};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_spider::config::SchedulerConfig;
use sumi_spider::{Scheduler, SchedulerState, WorkerPool};

fn create_scheduler(default_interval: i64) -> Scheduler {
    Scheduler::new(
        &SchedulerConfig::with_interval(default_interval),
        EchoFetcher::new(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_hosts_are_scheduled_independently() {
    let scheduler = create_scheduler(500);
    let recorder = Recorder::new();

    for url in [
        "https://a.com/1",
        "https://b.com/1",
        "https://www.a.com/2",
        "https://b.com/2",
    ] {
        assert!(scheduler.add_task(url, recorder.callback()).unwrap());
    }

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(recorder.offset_of("https://a.com/1"), Some(0));
    assert_eq!(recorder.offset_of("https://b.com/1"), Some(0));
    assert_eq!(recorder.offset_of("https://www.a.com/2"), Some(500));
    assert_eq!(recorder.offset_of("https://b.com/2"), Some(500));
}

#[tokio::test(start_paused = true)]
async fn test_immediate_shutdown_runs_no_pending_tasks() {
    let scheduler = create_scheduler(1000);
    let recorder = Recorder::new();

    for i in 0..5 {
        let url = format!("https://example.com/{}", i);
        assert!(scheduler.add_task(&url, recorder.callback()).unwrap());
    }
    assert_eq!(scheduler.pending_count(), 5);

    scheduler.shutdown(true);
    scheduler.await_termination().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(recorder.count(), 0);
    assert_eq!(scheduler.pending_count(), 0);
    assert!(scheduler.is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_graceful_shutdown_drains_queue() {
    let scheduler = create_scheduler(500);
    let recorder = Recorder::new();

    scheduler.add_task("https://a.com/1", recorder.callback()).unwrap();
    scheduler.add_task("https://a.com/2", recorder.callback()).unwrap();
    scheduler.shutdown(false);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(scheduler.state(), SchedulerState::Stopping);
    assert!(!scheduler.is_shutdown());
    assert_eq!(recorder.count(), 1);

    scheduler.await_termination().await;

    assert!(scheduler.is_shutdown());
    assert_eq!(recorder.offsets(), vec![0, 500]);
}

#[tokio::test(start_paused = true)]
async fn test_tasks_rejected_after_shutdown() {
    let scheduler = create_scheduler(0);
    let recorder = Recorder::new();

    scheduler.shutdown(false);
    assert!(!scheduler.add_task("https://a.com/", recorder.callback()).unwrap());

    scheduler.await_termination().await;
    assert!(!scheduler.add_task("https://a.com/", recorder.callback()).unwrap());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_interval_is_not_retroactive() {
    let scheduler = create_scheduler(1000);
    let recorder = Recorder::new();

    scheduler.add_task("https://a.com/1", recorder.callback()).unwrap();
    scheduler.add_task("https://a.com/2", recorder.callback()).unwrap();
    scheduler.set_interval("a.com", 5000).unwrap();
    scheduler.add_task("https://a.com/3", recorder.callback()).unwrap();

    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(recorder.offsets(), vec![0, 1000, 6000]);
}

#[tokio::test(start_paused = true)]
async fn test_interval_override_by_url() {
    let scheduler = create_scheduler(100);
    let recorder = Recorder::new();

    scheduler
        .set_interval("https://api.slow.com.cn/v1/items", 2000)
        .unwrap();
    scheduler.add_task("https://slow.com.cn/a", recorder.callback()).unwrap();
    scheduler.add_task("https://www.slow.com.cn/b", recorder.callback()).unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(recorder.offsets(), vec![0, 2000]);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_skips_callback_only() {
    let scheduler = create_scheduler(100);
    let recorder = Recorder::new();

    scheduler.add_task("https://a.com/ok-1", recorder.callback()).unwrap();
    scheduler.add_task("https://a.com/fail", recorder.callback()).unwrap();
    scheduler.add_task("https://a.com/ok-2", recorder.callback()).unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        recorder.bodies(),
        vec!["https://a.com/ok-1", "https://a.com/ok-2"]
    );
    assert_eq!(recorder.offset_of("https://a.com/ok-2"), Some(200));
}

#[tokio::test(start_paused = true)]
async fn test_callback_panic_is_contained() {
    let scheduler = create_scheduler(0);
    let recorder = Recorder::new();

    scheduler
        .add_task("https://a.com/boom", |_: String| panic!("callback failed"))
        .unwrap();
    scheduler.add_task("https://a.com/after", recorder.callback()).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(recorder.bodies(), vec!["https://a.com/after"]);

    scheduler.shutdown(false);
    scheduler.await_termination().await;
    assert!(scheduler.is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_discards_queue_and_stops() {
    let scheduler = create_scheduler(1000);
    let recorder = Recorder::new();

    for i in 0..3 {
        let url = format!("https://a.com/{}", i);
        scheduler.add_task(&url, recorder.callback()).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    scheduler.interrupt();
    scheduler.await_termination().await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(recorder.count(), 1);
    assert!(scheduler.is_shutdown());
    assert!(!scheduler.add_task("https://a.com/late", recorder.callback()).unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_separate_schedulers_do_not_share_hosts() {
    let first = create_scheduler(1000);
    let second = create_scheduler(1000);
    let recorder = Recorder::new();

    first.add_task("https://a.com/1", recorder.callback()).unwrap();
    second.add_task("https://a.com/2", recorder.callback()).unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(recorder.offsets(), vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn test_external_pool_survives_scheduler_stop() {
    let pool = Arc::new(WorkerPool::new(2));
    let scheduler = Scheduler::with_worker_pool(
        &SchedulerConfig::with_interval(100),
        EchoFetcher::new(),
        Arc::clone(&pool),
    );
    let recorder = Recorder::new();

    scheduler.add_task("https://a.com/1", recorder.callback()).unwrap();
    scheduler.shutdown(false);
    scheduler.await_termination().await;

    assert_eq!(recorder.count(), 1);
    assert!(!pool.is_shutdown());

    let (tx, rx) = tokio::sync::oneshot::channel();
    assert!(pool.submit(async move {
        let _ = tx.send(());
    }));
    assert!(rx.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_immediate_shutdown_abandons_only_own_work_on_external_pool() {
    let pool = Arc::new(WorkerPool::new(4));
    let scheduler = Scheduler::with_worker_pool(
        &SchedulerConfig::with_interval(0),
        EchoFetcher::slow(Duration::from_secs(1)),
        Arc::clone(&pool),
    );
    let recorder = Recorder::new();

    scheduler.add_task("https://a.com/slow", recorder.callback()).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (tx, rx) = tokio::sync::oneshot::channel();
    pool.submit(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let _ = tx.send(());
    });

    scheduler.shutdown(true);
    scheduler.await_termination().await;

    assert!(rx.await.is_ok());
    assert_eq!(recorder.count(), 0);
    assert!(!pool.is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_owned_pool_shut_down_with_scheduler() {
    let scheduler = create_scheduler(0);
    scheduler.shutdown(true);
    scheduler.await_termination().await;

    assert!(scheduler.worker_pool().is_shutdown());
}

#[tokio::test(start_paused = true)]
async fn test_subdomains_share_host_state() {
    let scheduler = create_scheduler(250);
    let recorder = Recorder::new();

    scheduler.add_task("https://example.com/", recorder.callback()).unwrap();
    scheduler.add_task("https://www.example.com/", recorder.callback()).unwrap();
    scheduler.add_task("https://api.example.com/", recorder.callback()).unwrap();

    let state = scheduler.host_state("example.com").unwrap();
    assert_eq!(state.admitted, 3);
    assert!(scheduler.host_state("other.com").is_none());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.offsets(), vec![0, 250, 500]);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_scheduler_lets_queued_tasks_run() {
    let recorder = Recorder::new();
    {
        let scheduler = create_scheduler(100);
        scheduler.add_task("https://a.com/1", recorder.callback()).unwrap();
        scheduler.add_task("https://a.com/2", recorder.callback()).unwrap();
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.offsets(), vec![0, 100]);
}

#[tokio::test(start_paused = true)]
async fn test_tasks_rejected_after_immediate_shutdown() {
    let scheduler = create_scheduler(0);
    let recorder = Recorder::new();

    scheduler.shutdown(true);
    assert!(!scheduler.add_task("https://a.com/1", recorder.callback()).unwrap());

    scheduler.await_termination().await;
    assert!(!scheduler.add_task("https://a.com/2", recorder.callback()).unwrap());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_host_admissions_are_spaced() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 5;
    const INTERVAL_MS: u64 = 50;

    let scheduler = create_scheduler(INTERVAL_MS as i64);
    let arrivals = Arc::new(Mutex::new(Vec::new()));
    let start = std::time::Instant::now();

    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let scheduler = &scheduler;
            let arrivals = Arc::clone(&arrivals);
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    let arrivals = Arc::clone(&arrivals);
                    let url = format!("https://www.example.com/{}/{}", thread, i);
                    let accepted = scheduler
                        .add_task(&url, move |_: String| {
                            arrivals.lock().unwrap().push(std::time::Instant::now())
                        })
                        .unwrap();
                    assert!(accepted);
                }
            });
        }
    });

    scheduler.shutdown(false);
    scheduler.await_termination().await;

    let mut arrivals = arrivals.lock().unwrap().clone();
    arrivals.sort();
    assert_eq!(arrivals.len(), THREADS * PER_THREAD);

    // Each slot is one interval after the previous, so the k-th callback
    // cannot arrive before k intervals have passed
    for (k, arrival) in arrivals.iter().enumerate() {
        let floor = Duration::from_millis(INTERVAL_MS * k as u64);
        assert!(
            arrival.duration_since(start) >= floor,
            "callback {} arrived after {:?}, before its slot at {:?}",
            k,
            arrival.duration_since(start),
            floor
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_admission_after_shutdown_flips_state() {
    const THREADS: usize = 4;

    let config = SchedulerConfig {
        queue_capacity: 1_000_000,
        ..SchedulerConfig::with_interval(0)
    };
    let scheduler = Scheduler::new(&config, EchoFetcher::new());
    let ran = Arc::new(AtomicUsize::new(0));
    let accepted = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for thread in 0..THREADS {
            let scheduler = &scheduler;
            let accepted = &accepted;
            let ran = Arc::clone(&ran);
            scope.spawn(move || {
                let mut i = 0;
                loop {
                    let ran = Arc::clone(&ran);
                    let url = format!("https://example.com/{}/{}", thread, i);
                    let admitted = scheduler
                        .add_task(&url, move |_: String| {
                            ran.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                    if !admitted {
                        break;
                    }
                    accepted.fetch_add(1, Ordering::SeqCst);
                    i += 1;
                }

                // Rejection only ever follows the state change, and sticks
                assert_ne!(scheduler.state(), SchedulerState::Running);
                assert!(!scheduler
                    .add_task("https://example.com/late", |_: String| {})
                    .unwrap());
            });
        }

        std::thread::sleep(Duration::from_millis(5));
        scheduler.shutdown(false);
        assert_ne!(scheduler.state(), SchedulerState::Running);
    });

    scheduler.await_termination().await;

    // Every admission before the flip ran; none slipped in after it
    assert_eq!(ran.load(Ordering::SeqCst), accepted.load(Ordering::SeqCst));
}
