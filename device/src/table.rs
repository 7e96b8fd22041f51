use std::collections::HashMap;

use parking_lot::Mutex;
use snafu::OptionExt;

use crate::buffer::{Buffer, DataPtr};
use crate::error::{Result, UnknownAllocationSnafu};

/// Registered buffers resolved for a copy.
pub(crate) enum CopyEnds<'a> {
    /// Source and destination are the same registered buffer.
    Same,
    Both { src: &'a Buffer, dst: &'a mut Buffer },
    /// Only the destination is registered; the source is host memory.
    ToBuffer(&'a mut Buffer),
    /// Only the source is registered; the destination is host memory.
    FromBuffer(&'a Buffer),
    Neither,
}

/// Pointer → buffer bookkeeping shared by every allocation path.
///
/// Each live entry is the sole owner of its buffer; removing the entry frees
/// the memory.
#[derive(Debug, Default)]
pub struct BufferTable {
    buffers: Mutex<HashMap<DataPtr, Buffer>>,
}

impl BufferTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `buffer` and return the pointer that now names it.
    pub fn register(&self, buffer: Buffer) -> DataPtr {
        let ptr = buffer.pointer();
        let previous = self.buffers.lock().insert(ptr, buffer);
        debug_assert!(previous.is_none(), "fresh allocation aliases live pointer {ptr}");
        ptr
    }

    /// Forget `ptr` and free its buffer.
    pub fn release(&self, ptr: DataPtr) -> Result<()> {
        let buffer = self.buffers.lock().remove(&ptr).context(UnknownAllocationSnafu { ptr })?;
        // Drop outside the lock; freeing VTCM takes the allocator's lock.
        drop(buffer);
        Ok(())
    }

    pub fn contains(&self, ptr: DataPtr) -> bool {
        self.buffers.lock().contains_key(&ptr)
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.lock().is_empty()
    }

    /// Bytes held by all live buffers.
    pub fn live_bytes(&self) -> usize {
        self.buffers.lock().values().map(Buffer::size).sum()
    }

    /// Run `f` on the buffer registered at `ptr`.
    pub fn with_buffer<R>(&self, ptr: DataPtr, f: impl FnOnce(&mut Buffer) -> R) -> Result<R> {
        let mut buffers = self.buffers.lock();
        tracing::trace!(%ptr, "buffer lookup");
        let buffer = buffers.get_mut(&ptr).context(UnknownAllocationSnafu { ptr })?;
        Ok(f(buffer))
    }

    /// Resolve both ends of a copy under a single lock.
    pub(crate) fn with_copy_ends<R>(&self, from: DataPtr, to: DataPtr, f: impl FnOnce(CopyEnds<'_>) -> R) -> R {
        let mut buffers = self.buffers.lock();
        tracing::trace!(%from, %to, "copy lookup");

        if from == to {
            return f(if buffers.contains_key(&from) { CopyEnds::Same } else { CopyEnds::Neither });
        }

        match buffers.get_disjoint_mut([&from, &to]) {
            [Some(src), Some(dst)] => f(CopyEnds::Both { src, dst }),
            [None, Some(dst)] => f(CopyEnds::ToBuffer(dst)),
            [Some(src), None] => f(CopyEnds::FromBuffer(src)),
            [None, None] => f(CopyEnds::Neither),
        }
    }
}
