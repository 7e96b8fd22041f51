use std::collections::{HashSet, VecDeque};
use std::fmt;

use parking_lot::Mutex;
use snafu::{OptionExt, ensure};

use crate::error::{InvalidHandleSnafu, ResourceExhaustedSnafu, Result};

/// Opaque token for one execution lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(usize);

impl StreamHandle {
    pub const fn new(lane: usize) -> Self {
        Self(lane)
    }

    pub const fn lane(self) -> usize {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

#[derive(Debug)]
struct PoolState {
    free: VecDeque<StreamHandle>,
    claimed: HashSet<StreamHandle>,
}

/// Stream handles not currently claimed by a caller.
///
/// Filled once from the thread manager's lanes; handles move between the free
/// queue and the claimed set, never appear in both, and unknown handles are
/// rejected.
#[derive(Debug)]
pub struct StreamPool {
    state: Mutex<PoolState>,
    lanes: usize,
}

impl StreamPool {
    pub fn new(handles: impl IntoIterator<Item = StreamHandle>) -> Self {
        let free: VecDeque<_> = handles.into_iter().collect();
        let lanes = free.len();
        Self { state: Mutex::new(PoolState { free, claimed: HashSet::with_capacity(lanes) }), lanes }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Claim the next free handle.
    pub fn acquire(&self) -> Result<StreamHandle> {
        let mut state = self.state.lock();
        let handle = state.free.pop_front().context(ResourceExhaustedSnafu { lanes: self.lanes })?;
        state.claimed.insert(handle);
        Ok(handle)
    }

    /// Return a claimed handle to the pool.
    pub fn release(&self, handle: StreamHandle) -> Result<()> {
        let mut state = self.state.lock();
        ensure!(state.claimed.remove(&handle), InvalidHandleSnafu { handle });
        state.free.push_back(handle);
        Ok(())
    }

    pub fn is_claimed(&self, handle: StreamHandle) -> bool {
        self.state.lock().claimed.contains(&handle)
    }

    pub fn ensure_claimed(&self, handle: StreamHandle) -> Result<()> {
        ensure!(self.is_claimed(handle), InvalidHandleSnafu { handle });
        Ok(())
    }

    pub fn available(&self) -> usize {
        self.state.lock().free.len()
    }

    pub fn claimed(&self) -> usize {
        self.state.lock().claimed.len()
    }

    /// Force every claimed handle back into the pool; returns how many were
    /// still out.
    pub fn reclaim_all(&self) -> usize {
        let mut state = self.state.lock();
        let mut reclaimed: Vec<_> = state.claimed.drain().collect();
        reclaimed.sort();
        let count = reclaimed.len();
        state.free.extend(reclaimed);
        count
    }
}
