//! Execution lanes behind stream handles.
//!
//! On the device every stream maps to one hardware thread with its own command
//! queue. [`WorkerPool`] reproduces that with OS threads; [`InlineManager`] is
//! the host simulation that runs each command on the dispatching thread.
//!
//! # Ordering
//!
//! Commands on one lane run in submission order. Commands on different lanes
//! are unordered unless joined with [`ThreadManager::sync_from_to`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use snafu::{OptionExt, ResultExt};

use crate::error::{
    InvalidHandleSnafu, NotStartedSnafu, QueueFullSnafu, Result, ThreadSpawnSnafu, WorkerDisconnectedSnafu,
};
use crate::stream::StreamHandle;
use crate::sync::{CpuTimelineSignal, TimelineSignal};

/// A unit of work queued on a lane.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Hosted threads run ordinary Rust code (formatting, unwinding); a QuRT-sized
/// stack is too small for that.
const HOST_MIN_STACK_SIZE: usize = 256 * (1 << 10);

/// Provider of stream lanes.
pub trait ThreadManager: Send + Sync + std::fmt::Debug {
    /// Every lane, in lane order.
    fn stream_handles(&self) -> Vec<StreamHandle>;

    /// Let lanes begin executing queued work. Idempotent.
    fn start(&self);

    fn is_started(&self) -> bool;

    /// Enqueue `job` on `stream` and return without waiting for it.
    fn dispatch(&self, stream: StreamHandle, job: Job) -> Result<()>;

    /// Block until everything enqueued on `src` so far has run; work queued on
    /// `dst` afterwards observes its effects. Fails with `NotStarted` instead
    /// of blocking when `src` has pending work that cannot run yet.
    fn sync_from_to(&self, src: StreamHandle, dst: StreamHandle) -> Result<()>;

    fn name(&self) -> &str;
}

/// Where a dispatched computation leaves its result.
///
/// Only meaningful to read after the stream it was dispatched on has been
/// synchronized.
#[derive(Debug)]
pub struct ResultSlot<R> {
    value: Arc<Mutex<Option<R>>>,
}

impl<R> Clone for ResultSlot<R> {
    fn clone(&self) -> Self {
        Self { value: Arc::clone(&self.value) }
    }
}

impl<R> Default for ResultSlot<R> {
    fn default() -> Self {
        Self { value: Arc::new(Mutex::new(None)) }
    }
}

impl<R> ResultSlot<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_filled(&self) -> bool {
        self.value.lock().is_some()
    }

    pub fn take(&self) -> Option<R> {
        self.value.lock().take()
    }

    pub(crate) fn fill(&self, value: R) {
        *self.value.lock() = Some(value);
    }
}

impl<R: Clone> ResultSlot<R> {
    pub fn get(&self) -> Option<R> {
        self.value.lock().clone()
    }
}

fn run_job(stream: StreamHandle, job: Job) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic>".to_string());
        tracing::error!(%stream, %message, "dispatched work panicked");
    }
}

#[derive(Debug)]
struct LaneQueue {
    /// `None` once the pool is shutting down.
    sender: Option<SyncSender<(u64, Job)>>,
    /// Timeline value of the last command accepted by the queue.
    submitted: u64,
}

#[derive(Debug)]
struct Lane {
    handle: StreamHandle,
    queue: Mutex<LaneQueue>,
    completed: Arc<CpuTimelineSignal>,
    worker: Option<JoinHandle<()>>,
}

/// One OS thread per lane, each fed by a bounded queue.
///
/// Workers are spawned idle and block on a start gate until
/// [`ThreadManager::start`]. Dropping the pool opens the gate, closes the
/// queues, lets workers drain what was already queued and joins them.
#[derive(Debug)]
pub struct WorkerPool {
    lanes: Vec<Lane>,
    start_gate: Arc<CpuTimelineSignal>,
    started: AtomicBool,
    queue_depth: usize,
}

impl WorkerPool {
    pub fn new(lanes: usize, stack_size: usize, queue_depth: usize) -> Result<Self> {
        let start_gate = Arc::new(CpuTimelineSignal::new());
        let stack_size = stack_size.max(HOST_MIN_STACK_SIZE);

        let mut pool = Self { lanes: Vec::with_capacity(lanes), start_gate, started: AtomicBool::new(false), queue_depth };
        for lane in 0..lanes {
            let handle = StreamHandle::new(lane);
            let (sender, receiver) = mpsc::sync_channel(queue_depth);
            let completed = Arc::new(CpuTimelineSignal::new());
            // On error `pool` drops and joins the lanes spawned so far.
            let worker = Self::spawn_worker(handle, stack_size, receiver, &pool.start_gate, &completed)?;
            pool.lanes.push(Lane {
                handle,
                queue: Mutex::new(LaneQueue { sender: Some(sender), submitted: 0 }),
                completed,
                worker: Some(worker),
            });
        }

        tracing::debug!(lanes, stack_size, queue_depth, "worker pool created");
        Ok(pool)
    }

    fn spawn_worker(
        handle: StreamHandle,
        stack_size: usize,
        receiver: Receiver<(u64, Job)>,
        start_gate: &Arc<CpuTimelineSignal>,
        completed: &Arc<CpuTimelineSignal>,
    ) -> Result<JoinHandle<()>> {
        let start_gate = Arc::clone(start_gate);
        let completed = Arc::clone(completed);

        thread::Builder::new()
            .name(format!("hexagon-{handle}"))
            .stack_size(stack_size)
            .spawn(move || {
                start_gate.wait(1);
                while let Ok((value, job)) = receiver.recv() {
                    run_job(handle, job);
                    completed.set(value);
                }
            })
            .context(ThreadSpawnSnafu)
    }

    fn lane(&self, stream: StreamHandle) -> Result<&Lane> {
        self.lanes.get(stream.lane()).context(InvalidHandleSnafu { handle: stream })
    }
}

impl ThreadManager for WorkerPool {
    fn stream_handles(&self) -> Vec<StreamHandle> {
        self.lanes.iter().map(|lane| lane.handle).collect()
    }

    fn start(&self) {
        if !self.started.swap(true, Ordering::AcqRel) {
            tracing::debug!(lanes = self.lanes.len(), "worker pool started");
        }
        self.start_gate.set(1);
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn dispatch(&self, stream: StreamHandle, job: Job) -> Result<()> {
        let lane = self.lane(stream)?;
        // Holding the queue lock keeps timeline values in submission order.
        let mut queue = lane.queue.lock();
        let value = queue.submitted + 1;
        let sender = queue.sender.as_ref().context(WorkerDisconnectedSnafu { stream })?;

        if self.is_started() {
            sender.send((value, job)).ok().context(WorkerDisconnectedSnafu { stream })?;
        } else {
            match sender.try_send((value, job)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => return QueueFullSnafu { stream, depth: self.queue_depth }.fail(),
                Err(TrySendError::Disconnected(_)) => return WorkerDisconnectedSnafu { stream }.fail(),
            }
        }

        queue.submitted = value;
        tracing::trace!(%stream, value, "work enqueued");
        Ok(())
    }

    fn sync_from_to(&self, src: StreamHandle, dst: StreamHandle) -> Result<()> {
        let source = self.lane(src)?;
        self.lane(dst)?;

        let target = source.queue.lock().submitted;
        // Gated workers would never reach `target`.
        snafu::ensure!(
            self.is_started() || source.completed.is_reached(target),
            NotStartedSnafu { stream: src }
        );
        tracing::trace!(%src, %dst, target, "joining streams");
        source.completed.wait(target);
        Ok(())
    }

    fn name(&self) -> &str {
        "workers"
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Release idle workers so they can observe the closed queues.
        self.start_gate.set(1);
        for lane in &mut self.lanes {
            lane.queue.lock().sender.take();
        }
        for lane in &mut self.lanes {
            if let Some(worker) = lane.worker.take()
                && worker.join().is_err()
            {
                tracing::warn!(stream = %lane.handle, "worker thread terminated abnormally");
            }
        }
    }
}

/// Host simulation: commands run to completion inside `dispatch`.
#[derive(Debug)]
pub struct InlineManager {
    lanes: usize,
    started: AtomicBool,
}

impl InlineManager {
    pub fn new(lanes: usize) -> Self {
        Self { lanes, started: AtomicBool::new(false) }
    }

    fn check(&self, stream: StreamHandle) -> Result<()> {
        snafu::ensure!(stream.lane() < self.lanes, InvalidHandleSnafu { handle: stream });
        Ok(())
    }
}

impl ThreadManager for InlineManager {
    fn stream_handles(&self) -> Vec<StreamHandle> {
        (0..self.lanes).map(StreamHandle::new).collect()
    }

    fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    fn dispatch(&self, stream: StreamHandle, job: Job) -> Result<()> {
        self.check(stream)?;
        run_job(stream, job);
        Ok(())
    }

    fn sync_from_to(&self, src: StreamHandle, dst: StreamHandle) -> Result<()> {
        self.check(src)?;
        self.check(dst)
    }

    fn name(&self) -> &str {
        "inline"
    }
}
