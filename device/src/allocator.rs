use snafu::{OptionExt, ensure};

use crate::buffer::MemoryScope;
use crate::error::{AllocationFailedSnafu, InvalidAlignmentSnafu, Result};

/// One aligned region of backing memory.
///
/// The region is over-allocated by `alignment - 1` bytes so that the aligned
/// start can be carved out of an ordinary heap block. The heap block never
/// moves, which keeps `addr()` stable for the lifetime of the value.
#[derive(Debug)]
pub struct RawBuffer {
    data: Box<[u8]>,
    offset: usize,
    size: usize,
}

impl RawBuffer {
    /// Allocate `size` zeroed bytes whose start is aligned to `alignment`.
    ///
    /// Zero-sized requests still reserve a byte so that every region has a
    /// distinct address.
    pub fn aligned(size: usize, alignment: usize) -> Result<Self> {
        ensure!(alignment.is_power_of_two(), InvalidAlignmentSnafu { alignment });

        let len = size.max(1).checked_add(alignment - 1).context(AllocationFailedSnafu { size, alignment })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok().context(AllocationFailedSnafu { size, alignment })?;
        data.resize(len, 0u8);
        let data = data.into_boxed_slice();

        let offset = data.as_ptr().align_offset(alignment);
        ensure!(offset.saturating_add(size) <= data.len(), AllocationFailedSnafu { size, alignment });

        Ok(Self { data, offset, size })
    }

    /// Usable size in bytes (without alignment padding).
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn addr(&self) -> usize {
        self.data[self.offset..].as_ptr() as usize
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.offset..self.offset + self.size]
    }
}

/// Backing store for Hexagon buffers.
pub trait Allocator: Send + Sync + std::fmt::Debug {
    fn alloc(&self, size: usize, alignment: usize) -> Result<RawBuffer>;

    /// Allocate `count` regions of `size` bytes each, all or nothing.
    fn alloc_many(&self, count: usize, size: usize, alignment: usize) -> Result<Vec<RawBuffer>> {
        (0..count).map(|_| self.alloc(size, alignment)).collect()
    }

    fn free(&self, _buffer: RawBuffer) {}

    /// Memory scope served by this allocator.
    fn scope(&self) -> MemoryScope;

    fn name(&self) -> &str;
}

/// DDR allocator serving the "global" scope.
#[derive(Debug, Clone, Default)]
pub struct HostAllocator;

impl Allocator for HostAllocator {
    fn alloc(&self, size: usize, alignment: usize) -> Result<RawBuffer> {
        RawBuffer::aligned(size, alignment)
    }

    fn scope(&self) -> MemoryScope {
        MemoryScope::Global
    }

    fn name(&self) -> &str {
        "DDR"
    }
}
