//! Owned Hexagon allocations.
//!
//! A [`Buffer`] is either a single aligned region (flat, 0-d and 1-d
//! requests) or a set of equally sized regions (2-d requests, one region per
//! row). Its external identity is one stable address: the data pointer for a
//! single region, or the address of an owned table of row pointers for the
//! 2-d case, which is what kernels expect for discontiguous layouts.

use std::fmt;
use std::sync::Arc;

use hexagon_dtype::DType;
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::allocator::{Allocator, RawBuffer};
use crate::error::{
    CopyOutOfBoundsSnafu, InvalidShapeSnafu, Result, UnsupportedDimensionsSnafu, UnsupportedScopeSnafu,
};

/// Raw device address handed to callers of the device API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataPtr(usize);

impl DataPtr {
    pub const fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub const fn addr(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *const u8 {
        self.0 as *const u8
    }

    pub fn as_mut_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }
}

impl fmt::Display for DataPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Where a buffer lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemoryScope {
    /// Ordinary DDR memory, "global".
    #[default]
    Global,
    /// Vector tightly coupled memory, "global.vtcm".
    Vtcm,
}

impl MemoryScope {
    /// Parse a scope tag. An absent tag means global memory.
    pub fn parse(scope: Option<&str>) -> Result<Self> {
        match scope {
            None | Some("global") => Ok(Self::Global),
            Some("global.vtcm") => Ok(Self::Vtcm),
            Some(other) => UnsupportedScopeSnafu { scope: other }.fail(),
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Vtcm => "global.vtcm",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical layout derived from a logical N-d request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdLayout {
    /// Number of separate regions.
    pub nallocs: usize,
    /// Bytes per region.
    pub nbytes: usize,
    /// True if the buffer exposes a row-pointer table.
    pub discontiguous: bool,
}

impl NdLayout {
    /// Map a shape onto Hexagon's allocation layout: 0-d holds one element,
    /// 1-d is one region, 2-d is `shape[0]` regions of `shape[1]` elements.
    pub fn from_shape(shape: &[i64], dtype: DType) -> Result<Self> {
        ensure!(shape.iter().all(|&extent| extent >= 0), InvalidShapeSnafu { shape: shape.to_vec() });
        let elem = dtype.bytes();

        match *shape {
            [] => Ok(Self { nallocs: 1, nbytes: elem, discontiguous: false }),
            [len] => {
                let nbytes = (len as usize).checked_mul(elem).context(InvalidShapeSnafu { shape: shape.to_vec() })?;
                Ok(Self { nallocs: 1, nbytes, discontiguous: false })
            }
            [rows, cols] => {
                // A row-pointer table with no rows has no stable address to hand out.
                ensure!(rows > 0, InvalidShapeSnafu { shape: shape.to_vec() });
                let nbytes = (cols as usize).checked_mul(elem).context(InvalidShapeSnafu { shape: shape.to_vec() })?;
                Ok(Self { nallocs: rows as usize, nbytes, discontiguous: true })
            }
            _ => UnsupportedDimensionsSnafu { ndim: shape.len() }.fail(),
        }
    }
}

/// Bytes of `shape` flattened into one region of `elem_bytes`-sized elements.
pub(crate) fn flat_size(shape: &[i64], elem_bytes: usize) -> Result<usize> {
    shape
        .iter()
        .try_fold(elem_bytes, |acc, &extent| usize::try_from(extent).ok().and_then(|extent| acc.checked_mul(extent)))
        .context(InvalidShapeSnafu { shape: shape.to_vec() })
}

/// An owned allocation. Dropping it returns every region to its allocator.
#[derive(Debug)]
pub struct Buffer {
    allocations: SmallVec<[RawBuffer; 1]>,
    /// Row pointers of a discontiguous buffer.
    row_table: Option<Box<[usize]>>,
    nbytes_per_allocation: usize,
    allocator: Arc<dyn Allocator>,
}

impl Buffer {
    /// Single contiguous region of `nbytes`.
    pub fn flat(allocator: Arc<dyn Allocator>, nbytes: usize, alignment: usize) -> Result<Self> {
        let raw = allocator.alloc(nbytes, alignment)?;
        let mut allocations = SmallVec::new();
        allocations.push(raw);
        Ok(Self { allocations, row_table: None, nbytes_per_allocation: nbytes, allocator })
    }

    /// `nallocs` regions of `nbytes` each, addressed through a row-pointer table.
    pub fn discontiguous(
        allocator: Arc<dyn Allocator>,
        nallocs: usize,
        nbytes: usize,
        alignment: usize,
    ) -> Result<Self> {
        let allocations: SmallVec<[RawBuffer; 1]> = allocator.alloc_many(nallocs, nbytes, alignment)?.into();
        let row_table = allocations.iter().map(RawBuffer::addr).collect::<Box<[usize]>>();
        Ok(Self { allocations, row_table: Some(row_table), nbytes_per_allocation: nbytes, allocator })
    }

    /// Build a buffer for a logical shape, preserving its N-d layout.
    pub fn from_shape(allocator: Arc<dyn Allocator>, shape: &[i64], dtype: DType, alignment: usize) -> Result<Self> {
        let layout = NdLayout::from_shape(shape, dtype)?;
        if layout.discontiguous {
            Self::discontiguous(allocator, layout.nallocs, layout.nbytes, alignment)
        } else {
            Self::flat(allocator, layout.nbytes, alignment)
        }
    }

    /// The address callers use to refer to this buffer.
    pub fn pointer(&self) -> DataPtr {
        match &self.row_table {
            Some(table) => DataPtr::from_ptr(table.as_ptr()),
            None => DataPtr::from_addr(self.allocations[0].addr()),
        }
    }

    /// Total usable bytes across all regions.
    pub fn size(&self) -> usize {
        self.allocations.len() * self.nbytes_per_allocation
    }

    pub fn nallocs(&self) -> usize {
        self.allocations.len()
    }

    pub fn scope(&self) -> MemoryScope {
        self.allocator.scope()
    }

    pub fn allocator(&self) -> &dyn Allocator {
        &*self.allocator
    }

    /// Addresses of the individual regions, in row order.
    pub fn region_addrs(&self) -> impl Iterator<Item = usize> + '_ {
        self.allocations.iter().map(RawBuffer::addr)
    }

    /// Fill the buffer from contiguous host memory, region by region.
    pub fn copy_from_host(&mut self, src: &[u8]) -> Result<()> {
        let available = self.size();
        ensure!(src.len() <= available, CopyOutOfBoundsSnafu { requested: src.len(), available });

        copy_segments(self.allocations.iter_mut().map(RawBuffer::as_mut_slice), std::iter::once(src), src.len());
        Ok(())
    }

    /// Gather the buffer into contiguous host memory.
    pub fn copy_to_host(&self, dst: &mut [u8]) -> Result<()> {
        let available = self.size();
        ensure!(dst.len() <= available, CopyOutOfBoundsSnafu { requested: dst.len(), available });

        let nbytes = dst.len();
        copy_segments(std::iter::once(dst), self.allocations.iter().map(RawBuffer::as_slice), nbytes);
        Ok(())
    }

    /// Copy the first `nbytes` of `src` into this buffer. The two buffers may
    /// have different region layouts.
    pub fn copy_from(&mut self, src: &Buffer, nbytes: usize) -> Result<()> {
        ensure!(nbytes <= src.size(), CopyOutOfBoundsSnafu { requested: nbytes, available: src.size() });
        ensure!(nbytes <= self.size(), CopyOutOfBoundsSnafu { requested: nbytes, available: self.size() });

        copy_segments(
            self.allocations.iter_mut().map(RawBuffer::as_mut_slice),
            src.allocations.iter().map(RawBuffer::as_slice),
            nbytes,
        );
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        for raw in self.allocations.drain(..) {
            self.allocator.free(raw);
        }
    }
}

/// Stream `nbytes` from a sequence of source segments into a sequence of
/// destination segments. Callers bound `nbytes` by both totals.
fn copy_segments<'d, 's>(
    dst: impl IntoIterator<Item = &'d mut [u8]>,
    src: impl IntoIterator<Item = &'s [u8]>,
    nbytes: usize,
) {
    let mut src = src.into_iter();
    let mut pending: &[u8] = &[];
    let mut remaining = nbytes;

    for mut segment in dst {
        while remaining > 0 && !segment.is_empty() {
            if pending.is_empty() {
                match src.next() {
                    Some(next) => pending = next,
                    None => return,
                }
                continue;
            }

            let n = segment.len().min(pending.len()).min(remaining);
            let (head, tail) = std::mem::take(&mut segment).split_at_mut(n);
            head.copy_from_slice(&pending[..n]);
            segment = tail;
            pending = &pending[n..];
            remaining -= n;
        }

        if remaining == 0 {
            return;
        }
    }
}
