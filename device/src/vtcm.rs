//! Vector tightly coupled memory.
//!
//! VTCM is a few megabytes of on-chip memory. Requests are accounted in exact
//! bytes against a fixed capacity and either fit completely or fail with
//! `CapacityExceeded`; nothing falls back to DDR.

use std::sync::Arc;

use hexagon_dtype::DType;
use parking_lot::Mutex;
use snafu::ensure;

use crate::allocator::{Allocator, RawBuffer};
use crate::buffer::{Buffer, DataPtr, MemoryScope};
use crate::error::{CapacityExceededSnafu, Result};
use crate::table::BufferTable;

/// Capacity-limited allocator for the VTCM region.
#[derive(Debug)]
pub struct VtcmAllocator {
    capacity: usize,
    used: Mutex<usize>,
}

impl VtcmAllocator {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, used: Mutex::new(0) }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        *self.used.lock()
    }

    pub fn available(&self) -> usize {
        self.capacity - self.used()
    }

    fn reserve(&self, requested: usize) -> Result<()> {
        let mut used = self.used.lock();
        let available = self.capacity - *used;
        ensure!(requested <= available, CapacityExceededSnafu { requested, available, capacity: self.capacity });
        *used += requested;
        Ok(())
    }

    fn unreserve(&self, bytes: usize) {
        let mut used = self.used.lock();
        *used = used.saturating_sub(bytes);
    }
}

impl Allocator for VtcmAllocator {
    fn alloc(&self, size: usize, alignment: usize) -> Result<RawBuffer> {
        self.reserve(size)?;
        RawBuffer::aligned(size, alignment).inspect_err(|_| self.unreserve(size))
    }

    fn alloc_many(&self, count: usize, size: usize, alignment: usize) -> Result<Vec<RawBuffer>> {
        let requested = count.checked_mul(size).unwrap_or(usize::MAX);
        self.reserve(requested)?;

        let mut regions = Vec::with_capacity(count);
        for _ in 0..count {
            match RawBuffer::aligned(size, alignment) {
                Ok(raw) => regions.push(raw),
                Err(e) => {
                    self.unreserve(requested);
                    return Err(e);
                }
            }
        }
        Ok(regions)
    }

    fn free(&self, buffer: RawBuffer) {
        self.unreserve(buffer.size());
    }

    fn scope(&self) -> MemoryScope {
        MemoryScope::Vtcm
    }

    fn name(&self) -> &str {
        "VTCM"
    }
}

/// VTCM workspace call path: allocations land in the shared table.
#[derive(Debug)]
pub struct VtcmManager {
    table: Arc<BufferTable>,
    allocator: Arc<VtcmAllocator>,
    alignment: usize,
}

impl VtcmManager {
    pub fn new(table: Arc<BufferTable>, allocator: Arc<VtcmAllocator>, alignment: usize) -> Self {
        Self { table, allocator, alignment }
    }

    /// Allocate a VTCM buffer with the N-d layout of `shape`.
    pub fn alloc(&self, shape: &[i64], dtype: DType) -> Result<DataPtr> {
        let buffer = Buffer::from_shape(self.allocator.clone(), shape, dtype, self.alignment)?;
        let nbytes = buffer.size();
        let ptr = self.table.register(buffer);
        tracing::debug!(%ptr, nbytes, used = self.allocator.used(), "VTCM allocated");
        Ok(ptr)
    }

    pub fn free(&self, ptr: DataPtr) -> Result<()> {
        self.table.release(ptr)?;
        tracing::debug!(%ptr, used = self.allocator.used(), "VTCM freed");
        Ok(())
    }

    pub fn allocator(&self) -> &Arc<VtcmAllocator> {
        &self.allocator
    }
}
