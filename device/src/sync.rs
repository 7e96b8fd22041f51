//! Timeline signals used to track stream progress.
//!
//! Each stream lane owns one signal. The lane stamps every command with the
//! next timeline value and publishes it once the command has run, so "all
//! work up to here is done" becomes "the signal reached value N".
//!
//! ```ignore
//! let signal = CpuTimelineSignal::new();
//!
//! // Worker
//! signal.set(1);
//!
//! // Waiter
//! signal.wait(1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

/// Monotonic counter that threads can block on.
pub trait TimelineSignal: Send + Sync + std::fmt::Debug {
    fn value(&self) -> u64;

    /// Advance the signal to `value`. Lower values are ignored.
    fn set(&self, value: u64);

    /// Block until the signal reaches or exceeds `value`.
    fn wait(&self, value: u64);

    fn is_reached(&self, value: u64) -> bool {
        self.value() >= value
    }
}

/// Timeline signal built on an atomic counter and a condvar.
#[derive(Debug)]
pub struct CpuTimelineSignal {
    value: AtomicU64,
    /// Guards the condvar only.
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Default for CpuTimelineSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTimelineSignal {
    pub fn new() -> Self {
        Self::with_initial(0)
    }

    pub fn with_initial(initial: u64) -> Self {
        Self { value: AtomicU64::new(initial), mutex: Mutex::new(()), condvar: Condvar::new() }
    }
}

impl TimelineSignal for CpuTimelineSignal {
    fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    fn set(&self, value: u64) {
        self.value.fetch_max(value, Ordering::AcqRel);

        // Taking the lock orders this wakeup after any waiter's value check.
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }

    fn wait(&self, target: u64) {
        if self.value.load(Ordering::Acquire) >= target {
            return;
        }

        let mut guard = self.mutex.lock();
        while self.value.load(Ordering::Acquire) < target {
            self.condvar.wait(&mut guard);
        }
    }
}
