use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::Error;
use crate::stream::StreamHandle;
use crate::thread_manager::{InlineManager, ResultSlot, ThreadManager, WorkerPool};

const S0: StreamHandle = StreamHandle::new(0);
const S1: StreamHandle = StreamHandle::new(1);

#[test]
fn test_worker_pool_handles() {
    let pool = WorkerPool::new(3, 0, 8).unwrap();
    assert_eq!(pool.stream_handles(), vec![StreamHandle::new(0), StreamHandle::new(1), StreamHandle::new(2)]);
    assert!(!pool.is_started());
}

#[test]
fn test_fifo_order_on_one_lane() {
    let pool = WorkerPool::new(2, 0, 256).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    for i in 0..100 {
        let log = Arc::clone(&log);
        pool.dispatch(S0, Box::new(move || log.lock().push(i))).unwrap();
    }
    pool.start();
    pool.sync_from_to(S0, S0).unwrap();

    assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn test_work_waits_for_start() {
    let pool = WorkerPool::new(1, 0, 4).unwrap();
    let ran = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&ran);
    pool.dispatch(S0, Box::new(move || flag.store(true, Ordering::SeqCst))).unwrap();
    std::thread::sleep(Duration::from_millis(20));
    assert!(!ran.load(Ordering::SeqCst));

    pool.start();
    pool.sync_from_to(S0, S0).unwrap();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn test_sync_refuses_gated_work() {
    let pool = WorkerPool::new(2, 0, 4).unwrap();
    pool.sync_from_to(S0, S1).unwrap();

    pool.dispatch(S0, Box::new(|| {})).unwrap();
    assert!(matches!(pool.sync_from_to(S0, S1), Err(Error::NotStarted { .. })));
    pool.sync_from_to(S1, S0).unwrap();

    pool.start();
    pool.sync_from_to(S0, S1).unwrap();
}

#[test]
fn test_queue_full_before_start() {
    let pool = WorkerPool::new(1, 0, 2).unwrap();

    pool.dispatch(S0, Box::new(|| {})).unwrap();
    pool.dispatch(S0, Box::new(|| {})).unwrap();
    let result = pool.dispatch(S0, Box::new(|| {}));
    assert!(matches!(result, Err(Error::QueueFull { depth: 2, .. })));
}

#[test]
fn test_back_pressure_after_start() {
    let pool = WorkerPool::new(1, 0, 1).unwrap();
    pool.start();

    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..16 {
        let count = Arc::clone(&count);
        pool.dispatch(S0, Box::new(move || { count.fetch_add(1, Ordering::SeqCst); })).unwrap();
    }
    pool.sync_from_to(S0, S0).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 16);
}

#[test]
fn test_sync_joins_lanes() {
    let pool = WorkerPool::new(2, 0, 8).unwrap();
    pool.start();
    let done = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&done);
    pool.dispatch(
        S0,
        Box::new(move || {
            std::thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::SeqCst);
        }),
    )
    .unwrap();

    pool.sync_from_to(S0, S1).unwrap();
    assert!(done.load(Ordering::SeqCst));
}

#[test]
fn test_panicking_work_keeps_lane_alive() {
    let pool = WorkerPool::new(1, 0, 8).unwrap();
    pool.start();
    let slot = ResultSlot::new();

    pool.dispatch(S0, Box::new(|| panic!("kernel fault"))).unwrap();
    let result = slot.clone();
    pool.dispatch(S0, Box::new(move || result.fill(7u32))).unwrap();

    pool.sync_from_to(S0, S0).unwrap();
    assert_eq!(slot.take(), Some(7));
}

#[test]
fn test_unknown_lane() {
    let pool = WorkerPool::new(1, 0, 8).unwrap();

    assert!(matches!(pool.dispatch(S1, Box::new(|| {})), Err(Error::InvalidHandle { .. })));
    assert!(pool.sync_from_to(S0, S1).is_err());
}

#[test]
fn test_drop_drains_queued_work() {
    let count = Arc::new(AtomicUsize::new(0));
    {
        let pool = WorkerPool::new(2, 0, 8).unwrap();
        for lane in [S0, S1, S0] {
            let count = Arc::clone(&count);
            pool.dispatch(lane, Box::new(move || { count.fetch_add(1, Ordering::SeqCst); })).unwrap();
        }
    }
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_inline_runs_on_caller() {
    let manager = InlineManager::new(2);
    let caller = std::thread::current().id();
    let slot = ResultSlot::new();

    let result = slot.clone();
    manager.dispatch(S1, Box::new(move || result.fill(std::thread::current().id()))).unwrap();
    assert_eq!(slot.take(), Some(caller));

    assert!(manager.dispatch(StreamHandle::new(2), Box::new(|| {})).is_err());
    assert!(manager.sync_from_to(S0, S1).is_ok());
}

#[test]
fn test_result_slot() {
    let slot: ResultSlot<String> = ResultSlot::new();
    assert!(!slot.is_filled());

    slot.clone().fill("done".to_string());
    assert!(slot.is_filled());
    assert_eq!(slot.get().as_deref(), Some("done"));
    assert_eq!(slot.take().as_deref(), Some("done"));
    assert!(slot.take().is_none());
}
