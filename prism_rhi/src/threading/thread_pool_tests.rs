//! Unit tests for thread_pool.rs

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_shutdown_runs_every_accepted_task() {
    let pool = ThreadPool::new("test", 4).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let futures: Vec<TaskFuture<()>> = (0..100)
        .map(|_| {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    pool.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert!(futures.iter().all(|future| future.is_ready()));
    for future in futures {
        assert!(future.wait().is_ok());
    }

    assert!(matches!(pool.submit(|| ()), Err(Error::ThreadPoolStopped)));
    assert!(!pool.is_running());
}

#[test]
fn test_submit_rejected_while_shutdown_drains() {
    let pool = ThreadPool::new("draining", 1).unwrap();
    let (release, gate) = flume::bounded::<()>(1);
    let blocking = pool.submit(move || gate.recv().is_ok()).unwrap();

    std::thread::scope(|scope| {
        let shutdown = scope.spawn(|| pool.shutdown());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pool.is_running() {
            assert!(std::time::Instant::now() < deadline, "shutdown never started");
            std::thread::sleep(Duration::from_millis(1));
        }

        // Shutdown is stuck joining the worker that runs the blocking task
        let late = scope.spawn(|| pool.submit(|| ()).map(|_| ())).join().unwrap();
        assert!(matches!(late, Err(Error::ThreadPoolStopped)));
        assert!(!shutdown.is_finished());
        assert!(!blocking.is_ready());

        release.send(()).unwrap();
        shutdown.join().unwrap();
    });

    assert_eq!(blocking.wait(), Ok(true));
    assert_eq!(pool.pending_tasks(), 0);
}

#[test]
fn test_future_returns_task_value() {
    let pool = ThreadPool::new("values", 2).unwrap();
    let future = pool.submit(|| (1..=10).sum::<u32>()).unwrap();
    assert_eq!(future.wait(), Ok(55));
}

#[test]
fn test_panicking_task_does_not_kill_worker() {
    let pool = ThreadPool::new("panics", 1).unwrap();
    let failed = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
    assert_eq!(failed.wait(), Err(Error::TaskAborted));

    // The single worker is still alive
    let next = pool.submit(|| 7).unwrap();
    assert_eq!(next.wait(), Ok(7));
}

#[test]
fn test_tasks_start_in_fifo_order() {
    let pool = ThreadPool::new("fifo", 1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let futures: Vec<_> = (0..10)
        .map(|i| {
            let order = Arc::clone(&order);
            pool.submit(move || order.lock().unwrap().push(i)).unwrap()
        })
        .collect();
    for future in futures {
        future.wait().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
}

#[test]
fn test_wait_timeout_on_running_task() {
    let pool = ThreadPool::new("slow", 1).unwrap();
    let (release, gate) = flume::bounded::<()>(1);
    let future = pool.submit(move || gate.recv().is_ok()).unwrap();

    assert!(future.wait_timeout(Duration::from_millis(20)).is_none());
    assert!(!future.is_ready());
    release.send(()).unwrap();
    assert_eq!(future.wait_timeout(Duration::from_secs(5)), Some(Ok(true)));
}

#[test]
fn test_zero_workers_rejected() {
    assert!(matches!(ThreadPool::new("empty", 0), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_drop_joins_workers() {
    let counter = Arc::new(AtomicUsize::new(0));
    {
        let pool = ThreadPool::new("dropped", 2).unwrap();
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 20);
}
